//! Cache-disabling response layer
//!
//! Every response the server sends passes through [`NoCache`], which appends
//! the three headers below after whatever the inner service produced. The
//! layer is the only place these headers are written.

use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use hyper::service::Service;
use hyper::{Request, Response};
use std::future::Future;
use std::pin::Pin;

pub const CACHE_CONTROL_VALUE: &str = "no-store, no-cache, must-revalidate, max-age=0";
pub const PRAGMA_VALUE: &str = "no-cache";
pub const EXPIRES_VALUE: &str = "0";

/// Append the cache-disabling headers, replacing any earlier values
///
/// Idempotent: each header ends up present exactly once.
pub fn apply_no_cache_headers(headers: &mut HeaderMap) {
    for name in [CACHE_CONTROL, PRAGMA, EXPIRES] {
        headers.remove(&name);
    }
    headers.append(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.append(PRAGMA, HeaderValue::from_static(PRAGMA_VALUE));
    headers.append(EXPIRES, HeaderValue::from_static(EXPIRES_VALUE));
}

/// Service wrapper that finalizes every response with the no-cache headers
#[derive(Debug, Clone)]
pub struct NoCache<S> {
    inner: S,
}

impl<S> NoCache<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NoCache<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<ReqBody>) -> Self::Future {
        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut resp = fut.await?;
            apply_no_cache_headers(resp.headers_mut());
            Ok(resp)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Empty, Full};
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::StatusCode;
    use std::convert::Infallible;

    fn assert_no_cache(headers: &HeaderMap) {
        for (name, value) in [
            (CACHE_CONTROL, CACHE_CONTROL_VALUE),
            (PRAGMA, PRAGMA_VALUE),
            (EXPIRES, EXPIRES_VALUE),
        ] {
            assert_eq!(headers.get_all(&name).iter().count(), 1, "{name}");
            assert_eq!(headers[&name], value);
        }
    }

    #[test]
    fn test_apply_on_empty_headers() {
        let mut headers = HeaderMap::new();
        apply_no_cache_headers(&mut headers);
        assert_no_cache(&headers);
    }

    #[test]
    fn test_apply_replaces_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));
        headers.append(CACHE_CONTROL, HeaderValue::from_static("immutable"));
        headers.insert(EXPIRES, HeaderValue::from_static("Thu, 01 Dec 2094 16:00:00 GMT"));

        apply_no_cache_headers(&mut headers);
        assert_no_cache(&headers);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut headers = HeaderMap::new();
        apply_no_cache_headers(&mut headers);
        apply_no_cache_headers(&mut headers);
        assert_no_cache(&headers);
    }

    #[test]
    fn test_headers_come_after_existing_ones() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));
        apply_no_cache_headers(&mut headers);

        let names: Vec<_> = headers.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["content-type", "cache-control", "pragma", "expires"]);
    }

    #[tokio::test]
    async fn test_layer_wraps_every_status() {
        for status in [
            StatusCode::OK,
            StatusCode::MOVED_PERMANENTLY,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let svc = NoCache::new(service_fn(move |_req: Request<Empty<Bytes>>| async move {
                let mut resp = Response::new(Full::new(Bytes::from_static(b"x")));
                *resp.status_mut() = status;
                Ok::<_, Infallible>(resp)
            }));

            let resp = svc.call(Request::new(Empty::new())).await.unwrap();
            assert_eq!(resp.status(), status);
            assert_no_cache(resp.headers());
        }
    }
}
