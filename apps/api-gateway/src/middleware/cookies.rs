use actix_web::{cookie::Cookie, dev::ServiceRequest, http::header};

use super::pipeline::{RequestContext, Stage, StageOutcome};

/// Parses `Cookie` headers into `RequestContext::cookies`.
///
/// Malformed pairs are skipped. When a name repeats, the first value wins.
pub struct CookieStage;

#[async_trait::async_trait(?Send)]
impl Stage for CookieStage {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn on_request(&self, req: &ServiceRequest, ctx: &mut RequestContext) -> StageOutcome {
        for line in req
            .headers()
            .get_all(header::COOKIE)
            .filter_map(|value| value.to_str().ok())
        {
            let pairs = line.split(';').map(str::trim).filter(|pair| !pair.is_empty());
            for cookie in pairs.filter_map(|pair| Cookie::parse_encoded(pair).ok()) {
                ctx.cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        StageOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    async fn parse(req: TestRequest) -> RequestContext {
        let mut ctx = RequestContext::default();
        CookieStage.on_request(&req.to_srv_request(), &mut ctx).await;
        ctx
    }

    #[actix_web::test]
    async fn test_parses_pairs() {
        let req = TestRequest::get().insert_header((header::COOKIE, "session=abc123; theme=dark"));

        let ctx = parse(req).await;

        assert_eq!(ctx.cookies.get("session").map(String::as_str), Some("abc123"));
        assert_eq!(ctx.cookies.get("theme").map(String::as_str), Some("dark"));
    }

    #[actix_web::test]
    async fn test_malformed_pairs_are_skipped() {
        let req = TestRequest::get().insert_header((header::COOKIE, "=orphan; ok=1; broken"));

        let ctx = parse(req).await;

        assert_eq!(ctx.cookies.len(), 1);
        assert_eq!(ctx.cookies.get("ok").map(String::as_str), Some("1"));
    }

    #[actix_web::test]
    async fn test_percent_encoded_values_are_decoded() {
        let req = TestRequest::get().insert_header((header::COOKIE, "name=Jane%20Doe"));

        let ctx = parse(req).await;

        assert_eq!(ctx.cookies.get("name").map(String::as_str), Some("Jane Doe"));
    }

    #[actix_web::test]
    async fn test_first_value_wins() {
        let req = TestRequest::get()
            .append_header((header::COOKIE, "id=first"))
            .append_header((header::COOKIE, "id=second"));

        let ctx = parse(req).await;

        assert_eq!(ctx.cookies.get("id").map(String::as_str), Some("first"));
    }

    #[actix_web::test]
    async fn test_no_cookie_header() {
        let ctx = parse(TestRequest::get()).await;

        assert!(ctx.cookies.is_empty());
    }
}
