//! Integration tests for mediated invitations, declines and bounces.

mod common;

use common::*;
use muc_proto::{ns, Affiliation, Element, Stanza};

async fn members_only_service() -> TestService {
    let mut svc = TestService::with_config(|c| {
        c.features.lock_new_rooms = Some(false);
        c.default_room.members_only = true;
        c.default_room.password_protected = true;
        c.default_room.password = Some("sesame".into());
    });
    svc.send(join_with_password("alice@example.org/pda", "alice", "sesame"))
        .await;
    svc.drain();
    svc
}

#[tokio::test]
async fn owner_invite_grants_membership_and_forwards_password() {
    let mut svc = members_only_service().await;

    let out = svc.send(invite("alice@example.org/pda", "dave@example.org")).await;
    assert_eq!(out.len(), 1);

    let forwarded = &out[0];
    assert_eq!(forwarded.get_attr("from"), Some(ROOM));
    assert_eq!(forwarded.get_attr("to"), Some("dave@example.org"));

    let x = forwarded.find_child_ns("x", ns::MUC_USER).unwrap();
    let inv = x.find_child("invite").unwrap();
    assert_eq!(inv.get_attr("from"), Some("alice@example.org/pda"));
    assert_eq!(x.find_child("password").unwrap().cdata(), "sesame");

    // Dave is now on the member list and may enter.
    assert_eq!(
        svc.room().lock().affiliation(&"dave@example.org".parse().unwrap()),
        Affiliation::Member
    );
    let entered = svc
        .send(join_with_password("dave@example.org/tab", "dave", "sesame"))
        .await;
    assert!(entered.iter().all(|s| s.typ() != Some("error")));
}

#[tokio::test]
async fn invite_carries_reason_continue_and_body() {
    let mut svc = members_only_service().await;

    let stanza = Stanza::from_element(Element::new("message"))
        .with_from("alice@example.org/pda")
        .with_to(ROOM)
        .with_child(
            Element::new("x").attr("xmlns", ns::MUC_USER).child(
                Element::new("invite")
                    .attr("to", "dave@example.org")
                    .child(Element::new("reason").text("join us"))
                    .child(Element::new("continue")),
            ),
        )
        .with_child(Element::new("body").text("come along"));

    let out = svc.send(stanza).await;
    let x = out[0].find_child_ns("x", ns::MUC_USER).unwrap();
    let inv = x.find_child("invite").unwrap();
    assert_eq!(inv.find_child("reason").unwrap().cdata(), "join us");
    assert!(inv.find_child("continue").is_some());
    assert_eq!(out[0].find_child("body").unwrap().cdata(), "come along");
}

#[tokio::test]
async fn non_occupant_cannot_invite() {
    let mut svc = members_only_service().await;
    let out = svc.send(invite("mallory@example.org/x", "dave@example.org")).await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("not-allowed"));
}

#[tokio::test]
async fn members_only_invites_require_member_list_editing() {
    // An open room where a plain participant may invite freely...
    let mut svc = TestService::with_config(|c| {
        c.features.lock_new_rooms = Some(false);
    });
    svc.send(join("alice@example.org/pda", "alice")).await;
    svc.send(join("bob@example.org/tab", "bob")).await;
    svc.drain();

    let out = svc.send(invite("bob@example.org/tab", "dave@example.org")).await;
    assert_eq!(out[0].get_attr("to"), Some("dave@example.org"));

    // ...but a members-only room demands member-list rights.
    let mut svc = members_only_service().await;
    svc.room()
        .lock()
        .set_affiliation(&"bob@example.org".parse().unwrap(), Affiliation::Member);
    svc.send(join_with_password("bob@example.org/tab", "bob", "sesame"))
        .await;
    svc.drain();

    let out = svc.send(invite("bob@example.org/tab", "dave@example.org")).await;
    assert_eq!(error_condition(&out[0]).as_deref(), Some("forbidden"));
}

#[tokio::test]
async fn decline_is_relayed_to_the_inviter() {
    let mut svc = members_only_service().await;
    svc.send(invite("alice@example.org/pda", "dave@example.org")).await;

    let decline = Stanza::from_element(Element::new("message"))
        .with_from("dave@example.org/tab")
        .with_to(ROOM)
        .with_child(
            Element::new("x").attr("xmlns", ns::MUC_USER).child(
                Element::new("decline")
                    .attr("to", "alice@example.org")
                    .child(Element::new("reason").text("busy")),
            ),
        );
    let out = svc.send(decline).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get_attr("from"), Some(ROOM));
    assert_eq!(out[0].get_attr("to"), Some("alice@example.org"));
    let relayed = out[0]
        .find_child_ns("x", ns::MUC_USER)
        .and_then(|x| x.find_child("decline"))
        .unwrap();
    assert_eq!(relayed.get_attr("from"), Some("dave@example.org/tab"));
    assert_eq!(relayed.find_child("reason").unwrap().cdata(), "busy");
}

#[tokio::test]
async fn bounced_invite_is_relayed_as_decline_with_condition() {
    let mut svc = members_only_service().await;
    svc.send(invite("alice@example.org/pda", "dave@example.org")).await;

    // The invitee's server bounced the forwarded invite.
    let bounce = Stanza::from_element(Element::new("message").attr("type", "error"))
        .with_from("dave@example.org")
        .with_to(ROOM)
        .with_child(
            Element::new("x").attr("xmlns", ns::MUC_USER).child(
                Element::new("invite").attr("from", "alice@example.org/pda"),
            ),
        )
        .with_child(
            Element::new("error").attr("type", "cancel").child(
                Element::new("service-unavailable").attr("xmlns", ns::STANZAS),
            ),
        );
    let out = svc.send(bounce).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get_attr("to"), Some("alice@example.org/pda"));
    let decline = out[0]
        .find_child_ns("x", ns::MUC_USER)
        .and_then(|x| x.find_child("decline"))
        .unwrap();
    assert!(decline
        .find_child("reason")
        .unwrap()
        .cdata()
        .contains("service-unavailable"));
}

#[tokio::test]
async fn invite_placeholder_never_blocks_eviction() {
    let mut svc = members_only_service().await;
    svc.send(invite("alice@example.org/pda", "dave@example.org")).await;

    svc.send(leave("alice@example.org/pda", "alice")).await;
    assert!(svc.component.context().rooms.get_room(&room_jid()).is_none());
}
