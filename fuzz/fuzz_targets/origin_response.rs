#![no_main]

use libfuzzer_sys::fuzz_target;

use cacheproxy::proxy::http::fuzzing::parse_origin_response;

fuzz_target!(|data: &[u8]| {
    parse_origin_response(data);
});
