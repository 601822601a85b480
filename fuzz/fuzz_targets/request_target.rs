#![no_main]

use libfuzzer_sys::fuzz_target;

use cacheproxy::proxy::http::fuzzing::resolve_request;

fuzz_target!(|data: &[u8]| {
    resolve_request(data);
});
