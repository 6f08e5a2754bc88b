//! Protocol adapter behavior against a seeded index

mod common;

use common::{Fixture, HOSTNAME};
use nntp_gateway::adapter::{Designator, Session, Wildmat};
use nntp_gateway::index::{IndexStore, RecordId};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};

#[tokio::test]
async fn select_group_stores_water_marks_and_total() {
    let fixture = Fixture::new().await;
    let group = fixture.seed_group("forum.general", 4).await;
    assert_eq!(group.min_index, 1);
    assert_eq!(group.max_index, 4);

    let mut session = Session::new();
    assert!(
        fixture
            .adapter
            .select_group(&mut session, "forum.general")
            .await
            .unwrap()
    );

    let view = session.group().unwrap();
    assert_eq!(view.min_index, 1);
    assert_eq!(view.max_index, 4);
    assert_eq!(view.total, 4);
    assert_eq!(view.current_article, 1);
}

#[tokio::test]
async fn select_missing_group_returns_false_and_leaves_session_unset() {
    let fixture = Fixture::new().await;
    let mut session = Session::new();

    assert!(
        !fixture
            .adapter
            .select_group(&mut session, "missing")
            .await
            .unwrap()
    );
    assert!(session.group().is_none());
}

#[tokio::test]
async fn select_denied_group_returns_false_and_keeps_previous_selection() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.public", 1).await;
    let private = fixture.seed_group("forum.private", 1).await;
    fixture.forum.restrict(private.source).await;

    let mut session = Session::new();
    assert!(
        fixture
            .adapter
            .select_group(&mut session, "forum.public")
            .await
            .unwrap()
    );
    assert!(
        !fixture
            .adapter
            .select_group(&mut session, "forum.private")
            .await
            .unwrap()
    );
    assert_eq!(session.group().unwrap().name, "forum.public");
}

#[tokio::test]
async fn list_groups_sorts_filters_and_applies_access() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.zebra", 1).await;
    fixture.seed_group("forum.alpha", 1).await;
    let private = fixture.seed_group("forum.private", 1).await;
    fixture.forum.restrict(private.source).await;
    fixture.seed_group("misc.offtopic", 1).await;

    let session = Session::new();
    let all = fixture
        .adapter
        .list_groups(&session, None, None)
        .await
        .unwrap();
    let names: Vec<&str> = all.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["forum.alpha", "forum.zebra", "misc.offtopic"]);

    let pattern = Wildmat::parse("forum.*");
    let filtered = fixture
        .adapter
        .list_groups(&session, None, Some(&pattern))
        .await
        .unwrap();
    let names: Vec<&str> = filtered.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["forum.alpha", "forum.zebra"]);
}

#[tokio::test]
async fn list_groups_since_excludes_older_groups() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.old", 1).await;

    let session = Session::new();
    let future = Utc::now() + Duration::hours(1);
    let recent = fixture
        .adapter
        .list_groups(&session, Some(future), None)
        .await
        .unwrap();
    assert!(recent.is_empty());

    let past = Utc::now() - Duration::hours(1);
    let all = fixture
        .adapter
        .list_groups(&session, Some(past), None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn get_article_by_number_requires_selected_group() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.general", 2).await;

    let session = Session::new();
    let result = fixture
        .adapter
        .get_article(&session, Designator::Number(1))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn get_article_resolves_by_number_and_message_id() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.general", 3).await;

    let mut session = Session::new();
    fixture
        .adapter
        .select_group(&mut session, "forum.general")
        .await
        .unwrap();

    let by_number = fixture
        .adapter
        .get_article(&session, Designator::Number(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.index, 2);
    assert_eq!(by_number.subject.as_deref(), Some("Post 2"));
    assert_eq!(by_number.group_name, "forum.general");

    // The same article through its global message-id, without a group
    let fresh = Session::new();
    let designator =
        Designator::parse(&format!("<{}@{}>", by_number.source, HOSTNAME)).unwrap();
    let by_id = fixture
        .adapter
        .get_article(&fresh, designator)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.index, 2);
    assert_eq!(by_id.source, by_number.source);
}

#[tokio::test]
async fn get_article_by_message_id_rechecks_access() {
    let fixture = Fixture::new().await;
    let private = fixture.seed_group("forum.private", 1).await;

    // Find the article before restricting the group
    let article = fixture
        .store
        .article_by_number(private.id, 1)
        .await
        .unwrap()
        .unwrap();
    fixture.forum.restrict(private.source).await;

    let session = Session::new();
    let result = fixture
        .adapter
        .get_article(&session, Designator::MessageId(article.source))
        .await
        .unwrap();
    assert!(result.is_none(), "denied article must resolve to nothing");
}

#[tokio::test]
async fn get_range_silently_omits_missing_indices() {
    let fixture = Fixture::new().await;
    let group = fixture.seed_group("general", 10).await;

    // Prune below index 5 the way retention would
    let keep_from = fixture
        .store
        .article_by_number(group.id, 5)
        .await
        .unwrap()
        .unwrap();
    fixture
        .store
        .delete_articles_before(group.id, keep_from.id)
        .await
        .unwrap();
    fixture
        .store
        .set_group_min_index(group.id, 5)
        .await
        .unwrap();

    let mut session = Session::new();
    fixture
        .adapter
        .select_group(&mut session, "general")
        .await
        .unwrap();
    assert_eq!(session.group().unwrap().min_index, 5);
    assert_eq!(session.group().unwrap().max_index, 10);

    // 3 and 4 are pruned: only 5, 6, 7 come back, and it is not an error
    let range = fixture.adapter.get_range(&session, 3, 7).await.unwrap();
    let indices: Vec<u64> = range.iter().map(|a| a.index).collect();
    assert_eq!(indices, [5, 6, 7]);
}

#[tokio::test]
async fn get_range_without_selection_is_empty() {
    let fixture = Fixture::new().await;
    fixture.seed_group("general", 3).await;

    let session = Session::new();
    assert!(fixture.adapter.get_range(&session, 1, 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_new_articles_honors_since_pattern_and_access() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.pub", 3).await;
    let private = fixture.seed_group("forum.sec", 3).await;
    fixture.forum.restrict(private.source).await;
    fixture.seed_group("misc.chat", 3).await;

    let session = Session::new();
    let since = Utc::now() - Duration::hours(60);
    let pattern = Wildmat::parse("forum.*");

    // Posts are aged 3, 2, 1 days; "since 2.5 days ago" keeps the newest
    // two, the pattern drops misc.chat, access drops forum.sec
    let articles = fixture
        .adapter
        .get_new_articles(&session, since, Some(&pattern))
        .await
        .unwrap();
    assert_eq!(articles.len(), 2);
    assert!(articles.windows(2).all(|w| w[0].id <= w[1].id));
}

#[tokio::test]
async fn authenticate_consumes_staged_credentials_once() {
    let fixture = Fixture::new().await;
    fixture
        .identity
        .add_account("alice", Some("secret"), Some("de-DE"))
        .await;

    let mut session = Session::new();
    session.stage_user("alice");
    session.stage_pass("wrong");
    assert!(!fixture.adapter.authenticate(&mut session).await.unwrap());
    assert!(!session.is_authenticated());

    // Staged pair is gone: an immediate retry has nothing to verify
    assert!(!fixture.adapter.authenticate(&mut session).await.unwrap());

    session.stage_user("alice");
    session.stage_pass("secret");
    assert!(fixture.adapter.authenticate(&mut session).await.unwrap());
    assert!(session.is_authenticated());
    assert_eq!(session.locale(), Some("de-DE"));
}

#[tokio::test]
async fn authenticated_session_sees_restricted_groups() {
    let fixture = Fixture::new().await;
    let private = fixture.seed_group("forum.private", 1).await;
    fixture.forum.restrict(private.source).await;
    fixture
        .identity
        .add_account("alice", Some("secret"), None)
        .await;

    let mut session = Session::new();
    assert!(
        !fixture
            .adapter
            .select_group(&mut session, "forum.private")
            .await
            .unwrap()
    );

    session.stage_user("alice");
    session.stage_pass("secret");
    assert!(fixture.adapter.authenticate(&mut session).await.unwrap());

    assert!(
        fixture
            .adapter
            .select_group(&mut session, "forum.private")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn body_render_uses_requester_locale_with_default_fallback() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.general", 1).await;
    fixture
        .identity
        .add_account("alice", Some("secret"), Some("fr-FR"))
        .await;

    let mut session = Session::new();
    fixture
        .adapter
        .select_group(&mut session, "forum.general")
        .await
        .unwrap();

    let guest_view = fixture
        .adapter
        .get_article(&session, Designator::Number(1))
        .await
        .unwrap()
        .unwrap();
    assert!(guest_view.html.contains("lang=\"en-US\""));

    session.stage_user("alice");
    session.stage_pass("secret");
    fixture.adapter.authenticate(&mut session).await.unwrap();

    let localized = fixture
        .adapter
        .get_article(&session, Designator::Number(1))
        .await
        .unwrap()
        .unwrap();
    assert!(localized.html.contains("lang=\"fr-FR\""));
}

#[tokio::test]
async fn build_body_roundtrips_and_wraps_at_76() {
    let fixture = Fixture::new().await;
    let group = fixture.add_group("forum.general").await;
    fixture
        .forum
        .add_post(
            group.source,
            Some("alice"),
            Some("Long"),
            None,
            1,
            &"long paragraph text ".repeat(40),
        )
        .await;
    fixture.rebuild.rebuild_group(group.id).await.unwrap();

    let mut session = Session::new();
    fixture
        .adapter
        .select_group(&mut session, "forum.general")
        .await
        .unwrap();
    let article = fixture
        .adapter
        .get_article(&session, Designator::Number(1))
        .await
        .unwrap()
        .unwrap();

    let body = fixture.adapter.build_body(&article);
    let lines: Vec<&[u8]> = body.split(|&b| b == b'\n').collect();
    for line in &lines {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        assert!(line.len() <= 76);
    }

    let joined: Vec<u8> = body
        .split(|&b| b == b'\r' || b == b'\n')
        .flatten()
        .copied()
        .collect();
    let decoded = String::from_utf8(STANDARD.decode(joined).unwrap()).unwrap();
    assert_eq!(decoded, article.html);
}

#[tokio::test]
async fn build_headers_synthesizes_threading_fields() {
    let fixture = Fixture::new().await;
    let group = fixture.add_group("forum.general").await;
    let root = fixture
        .forum
        .add_post(group.source, Some("alice"), Some("Root"), None, 2, "root")
        .await;
    fixture
        .forum
        .add_post(group.source, Some("bob"), Some("Re: Root"), Some(root), 1, "reply")
        .await;
    fixture.rebuild.rebuild_group(group.id).await.unwrap();

    let mut session = Session::new();
    fixture
        .adapter
        .select_group(&mut session, "forum.general")
        .await
        .unwrap();

    let reply = fixture
        .adapter
        .get_article(&session, Designator::Number(2))
        .await
        .unwrap()
        .unwrap();
    let headers = fixture.adapter.build_headers(&reply);

    assert!(headers.contains(&format!("References: <{}@{}>", root, HOSTNAME)));
    assert!(headers.contains(&format!("Xref: {} forum.general:2", HOSTNAME)));
    assert!(headers.iter().any(|h| h == "From: bob"));
    assert!(headers.iter().any(|h| h == "Content-Transfer-Encoding: base64"));
}

#[tokio::test]
async fn article_ids_from_unknown_sources_resolve_to_nothing() {
    let fixture = Fixture::new().await;
    fixture.seed_group("forum.general", 1).await;

    let session = Session::new();
    let result = fixture
        .adapter
        .get_article(&session, Designator::MessageId(RecordId::generate()))
        .await
        .unwrap();
    assert!(result.is_none());
}
