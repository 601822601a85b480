pub(crate) mod cache_control;
mod codec;
mod origin;
pub mod session;

pub use codec::OriginResponse;
pub use origin::{OriginClient, OriginExchange};
pub use session::{SessionState, serve};

#[cfg(feature = "fuzzing")]
pub mod fuzzing {
    use crate::proxy::cache::CacheKey;
    use crate::proxy::request::Request;
    use crate::proxy::target::ResolvedTarget;

    pub use super::codec::OriginResponse;

    /// Runs a raw client request through parsing, target resolution and key derivation.
    pub fn resolve_request(data: &[u8]) {
        if let Ok(request) = Request::parse(data) {
            let target = ResolvedTarget::resolve(&request.target);
            assert!(!target.resource_path.contains("/.."));
            assert!(target.resource_path.starts_with('/'));
            let _ = CacheKey::for_target(&target);
            let _ = super::origin::build_origin_request(&request, &target);
        }
    }

    pub fn parse_origin_response(data: &[u8]) {
        let response = OriginResponse::from_raw(bytes::Bytes::copy_from_slice(data));
        let _ = super::cache_control::parse_cache_control(&response);
    }
}
