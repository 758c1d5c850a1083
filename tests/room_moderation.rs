//! Integration tests for the moderation protocol: admin get/set, kicks,
//! bans, voice changes and the permission matrix side effects.

mod common;

use common::*;
use muc_proto::{ns, Affiliation, Element, Role};

async fn occupied_service() -> TestService {
    let mut svc = TestService::with_config(|c| {
        c.features.lock_new_rooms = Some(false);
    });
    svc.send(join("alice@example.org/pda", "alice")).await;
    svc.send(join("carol@example.org/web", "carol")).await;
    svc.drain();
    svc
}

#[tokio::test]
async fn owner_kick_removes_sessions_and_broadcasts_307() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_set(
            "alice@example.org/pda",
            vec![Element::new("item")
                .attr("role", "none")
                .attr("jid", "carol@example.org")
                .attr("nick", "carol")
                .child(Element::new("reason").text("misbehaving"))],
        ))
        .await;

    // Result IQ comes first.
    assert_eq!(out[0].name(), "iq");
    assert_eq!(out[0].typ(), Some("result"));

    // Carol gets an unavailable presence with 307, actor and reason.
    let to_carol = addressed_to(&out, "carol@example.org/web");
    let kick = to_carol.iter().find(|s| s.name() == "presence").unwrap();
    assert_eq!(kick.typ(), Some("unavailable"));
    assert!(status_codes(kick).contains(&307));
    let x = kick.find_child_ns("x", ns::MUC_USER).unwrap();
    assert_eq!(
        x.find_child("actor").and_then(|a| a.get_attr("jid")),
        Some("alice@example.org/pda")
    );
    assert_eq!(x.find_child("reason").unwrap().cdata(), "misbehaving");

    // Remaining occupants see the removal too.
    let to_alice = addressed_to(&out, "alice@example.org/pda");
    assert!(to_alice
        .iter()
        .any(|s| s.name() == "presence" && status_codes(s).contains(&307)));

    let room = svc.room();
    let st = room.lock();
    assert_eq!(st.occupant_count(), 1);
    assert!(st.nickname_of_bare(&"carol@example.org".parse().unwrap()).is_none());
}

#[tokio::test]
async fn ban_sets_outcast_broadcasts_301_and_blocks_reentry() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_set(
            "alice@example.org/pda",
            vec![Element::new("item")
                .attr("affiliation", "outcast")
                .attr("jid", "carol@example.org")],
        ))
        .await;

    let to_carol = addressed_to(&out, "carol@example.org/web");
    let ban = to_carol.iter().find(|s| s.name() == "presence").unwrap();
    assert_eq!(ban.typ(), Some("unavailable"));
    assert!(status_codes(ban).contains(&301));

    {
        let room = svc.room();
        let st = room.lock();
        assert_eq!(
            st.affiliation(&"carol@example.org".parse().unwrap()),
            Affiliation::Outcast
        );
        assert_eq!(st.occupant_count(), 1);
    }

    // The affiliation outlives the removal: re-entry is forbidden.
    let out = svc.send(join("carol@example.org/web", "carol")).await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("forbidden"));
}

#[tokio::test]
async fn voice_revoke_and_grant_update_roles() {
    let mut svc = occupied_service().await;

    svc.send(admin_set(
        "alice@example.org/pda",
        vec![Element::new("item").attr("role", "visitor").attr("nick", "carol")],
    ))
    .await;
    assert_eq!(svc.room().lock().role_of("carol"), Role::Visitor);

    let out = svc
        .send(admin_set(
            "alice@example.org/pda",
            vec![Element::new("item").attr("role", "participant").attr("nick", "carol")],
        ))
        .await;
    assert_eq!(svc.room().lock().role_of("carol"), Role::Participant);

    // Update presences carry no removal codes.
    assert!(out
        .iter()
        .filter(|s| s.name() == "presence")
        .all(|s| status_codes(s).is_empty()));
}

#[tokio::test]
async fn participants_cannot_kick() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_set(
            "carol@example.org/web",
            vec![Element::new("item").attr("role", "none").attr("nick", "alice")],
        ))
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(error_condition(&out[0]).as_deref(), Some("not-allowed"));
    assert_eq!(svc.room().lock().occupant_count(), 2);
}

#[tokio::test]
async fn admins_cannot_ban_owners() {
    let mut svc = occupied_service().await;
    svc.room()
        .lock()
        .set_affiliation(&"carol@example.org".parse().unwrap(), Affiliation::Admin);

    let out = svc
        .send(admin_set(
            "carol@example.org/web",
            vec![Element::new("item")
                .attr("affiliation", "outcast")
                .attr("jid", "alice@example.org")],
        ))
        .await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("not-allowed"));
    assert_eq!(
        svc.room().lock().affiliation(&"alice@example.org".parse().unwrap()),
        Affiliation::Owner
    );
}

#[tokio::test]
async fn failing_item_rejects_the_whole_set() {
    let mut svc = occupied_service().await;

    // First item alone would be fine; the second is not allowed, so neither
    // may be applied.
    let out = svc
        .send(admin_set(
            "alice@example.org/pda",
            vec![
                Element::new("item").attr("role", "visitor").attr("nick", "carol"),
                Element::new("item")
                    .attr("affiliation", "outcast")
                    .attr("jid", "alice@example.org"),
            ],
        ))
        .await;

    assert_eq!(error_condition(&out[0]).as_deref(), Some("not-allowed"));
    let room = svc.room();
    let st = room.lock();
    assert_eq!(st.role_of("carol"), Role::Participant, "no partial application");
    assert_eq!(
        st.affiliation(&"alice@example.org".parse().unwrap()),
        Affiliation::Owner
    );
}

#[tokio::test]
async fn get_by_role_lists_matching_occupants() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_get(
            "alice@example.org/pda",
            Element::new("item").attr("role", "participant"),
        ))
        .await;

    assert_eq!(out[0].typ(), Some("result"));
    let query = out[0].find_child_ns("query", ns::MUC_ADMIN).unwrap();
    let items: Vec<_> = query.children().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get_attr("nick"), Some("carol"));
    assert_eq!(items[0].get_attr("role"), Some("participant"));
    // JIDs are listed unless the room is fully anonymous.
    assert_eq!(items[0].get_attr("jid"), Some("carol@example.org/web"));
}

#[tokio::test]
async fn get_by_affiliation_includes_offline_jids() {
    let mut svc = occupied_service().await;
    svc.room()
        .lock()
        .set_affiliation(&"dave@example.org".parse().unwrap(), Affiliation::Member);

    let out = svc
        .send(admin_get(
            "alice@example.org/pda",
            Element::new("item").attr("affiliation", "member"),
        ))
        .await;

    let query = out[0].find_child_ns("query", ns::MUC_ADMIN).unwrap();
    let items: Vec<_> = query.children().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get_attr("jid"), Some("dave@example.org"));
    // Offline: no nickname, no role.
    assert_eq!(items[0].get_attr("nick"), None);
}

#[tokio::test]
async fn get_requires_admin_affiliation() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_get(
            "carol@example.org/web",
            Element::new("item").attr("role", "participant"),
        ))
        .await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("forbidden"));
}

#[tokio::test]
async fn get_filter_must_name_exactly_one_dimension() {
    let mut svc = occupied_service().await;

    let out = svc
        .send(admin_get(
            "alice@example.org/pda",
            Element::new("item")
                .attr("role", "participant")
                .attr("affiliation", "member"),
        ))
        .await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("bad-request"));

    let out = svc
        .send(admin_get("alice@example.org/pda", Element::new("item")))
        .await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("bad-request"));
}

#[tokio::test]
async fn ban_of_multi_session_occupant_removes_every_session() {
    let mut svc = occupied_service().await;
    svc.send(join("carol@example.org/desk", "carol")).await;
    svc.drain();

    svc.send(admin_set(
        "alice@example.org/pda",
        vec![Element::new("item")
            .attr("affiliation", "outcast")
            .attr("jid", "carol@example.org")],
    ))
    .await;

    let room = svc.room();
    let st = room.lock();
    assert!(st.sessions_of_bare(&"carol@example.org".parse().unwrap()).is_empty());
    assert_eq!(st.occupant_count(), 1);
}

#[tokio::test]
async fn moderated_room_gives_visitor_role_to_unaffiliated() {
    let mut svc = TestService::with_config(|c| {
        c.features.lock_new_rooms = Some(false);
        c.default_room.moderated = true;
    });
    svc.send(join("alice@example.org/pda", "alice")).await;
    svc.send(join("carol@example.org/web", "carol")).await;

    let room = svc.room();
    let st = room.lock();
    assert_eq!(st.role_of("alice"), Role::Moderator);
    assert_eq!(st.role_of("carol"), Role::Visitor);
}
