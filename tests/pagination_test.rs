mod common;

use common::{context, user_response, User};
use futures_util::StreamExt;
use rbxweb::http::mock::MockResponse;
use rbxweb::{
    collect_all, fetch_page, stream_pages, ApiContext, ApiRequest, CursorQuery, ErrorKind,
    FixedLimit, LazyRef, Page, RbxError, SortOrder,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRow {
    user_id: u64,
}

fn members_page(ids: &[u64], next: Option<&str>) -> MockResponse {
    let data: Vec<_> = ids.iter().map(|id| serde_json::json!({ "userId": id })).collect();
    MockResponse::json(
        200,
        serde_json::json!({ "previousPageCursor": null, "nextPageCursor": next, "data": data }),
    )
}

#[tokio::test]
async fn test_walk_visits_every_member_once() {
    let (ctx, transport) = context();
    transport.push(members_page(&[1, 2, 3], Some("cursor_a")));
    transport.push(members_page(&[4, 5], Some("cursor_b==")));
    transport.push(members_page(&[6], None));

    let members = collect_all(|cursor| {
        let ctx = &ctx;
        async move {
            let query = CursorQuery::new(FixedLimit::Hundred)
                .cursor(cursor)
                .sort_order(SortOrder::Desc);
            let request = ApiRequest::get("/v1/groups/42/users").subdomain("groups");
            let page: Page<MemberRow> = fetch_page(ctx, None, request, &query).await?;
            Ok::<_, RbxError>(page.map(|row| LazyRef::<User>::new(row.user_id, None)))
        }
    })
    .await
    .unwrap();

    assert_eq!(
        members.iter().map(LazyRef::id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6]
    );
    assert!(members.iter().all(|m| !m.is_resolved()));

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://groups.roblox.com/v1/groups/42/users?limit=100&sortOrder=Desc",
            "https://groups.roblox.com/v1/groups/42/users?limit=100&cursor=cursor_a&sortOrder=Desc",
            "https://groups.roblox.com/v1/groups/42/users?limit=100&cursor=cursor_b%3D%3D&sortOrder=Desc",
        ]
    );

    // Detail is fetched only for the member actually asked about.
    transport.push(user_response(5, "Five"));
    let five = members[4].resolve(&ctx).await.unwrap();
    assert_eq!(five.display_name(), "Five");
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn test_failing_page_aborts_enumeration() {
    let (ctx, transport) = context();
    transport.push(members_page(&[1], Some("next")));
    transport.push(MockResponse::text(429, ""));

    let fetch = |cursor: Option<String>| {
        let ctx = &ctx;
        async move {
            let query = CursorQuery::new(FixedLimit::Ten).cursor(cursor);
            fetch_page::<MemberRow>(ctx, None, ApiRequest::get("/v1/groups/1/users"), &query).await
        }
    };

    let err = collect_all(fetch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(transport.call_count(), 2);

    transport.push(members_page(&[1], Some("next")));
    transport.push(MockResponse::text(500, "oops"));
    let results: Vec<_> = stream_pages(fetch).collect().await;
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert_eq!(
        results[1].as_ref().unwrap_err().kind(),
        ErrorKind::UnknownRemoteFailure
    );
}

async fn list_members(ctx: &ApiContext, limit: u32) -> rbxweb::Result<Page<MemberRow>> {
    let query = CursorQuery::with_limit(limit)?;
    fetch_page(ctx, None, ApiRequest::get("/v1/groups/1/users").subdomain("groups"), &query).await
}

#[tokio::test]
async fn test_bad_page_size_never_reaches_network() {
    let (ctx, transport) = context();

    for size in [0, 30, 250] {
        let err = list_members(&ctx, size).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert_eq!(transport.call_count(), 0);

    transport.push(members_page(&[8], None));
    let page = list_members(&ctx, 50).await.unwrap();
    assert_eq!(page.items[0].user_id, 8);
    assert!(!page.has_next());
    assert_eq!(transport.call_count(), 1);
}
