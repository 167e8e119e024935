use chrono::{Duration, Utc};
use meshgate_storage::{
    DormantInviteLedger, GroupId, GroupInvite, GroupInviteId, GroupRole, InviteState, InviteStore,
    OrganizationId, OrganizationInvite, OrganizationInviteId, OrganizationRole, PageParams,
    StoreError, TypedId, UserId, UserRole,
};
use meshgate_store_sqlite::SqliteStore;

struct Bundle {
    parent: OrganizationInvite,
    children: Vec<GroupInvite>,
}

/// One pending organization invite with a dormant group invite per group, linked.
async fn seed_bundle(s: &SqliteStore, email: &str, groups: &[GroupId]) -> Bundle {
    let inviter = UserId::generate();
    let now = Utc::now();
    let parent = OrganizationInvite {
        id: OrganizationInviteId::generate(),
        organization_id: OrganizationId::generate(),
        invitee_id: None,
        invitee_email: email.to_string(),
        inviter_id: inviter.clone(),
        role: OrganizationRole::Viewer,
        created_at: now,
        expires_at: now + Duration::days(7),
        state: InviteState::Pending,
    };
    let children: Vec<_> = groups
        .iter()
        .map(|group_id| GroupInvite {
            id: GroupInviteId::generate(),
            group_id: group_id.clone(),
            invitee_id: None,
            invitee_email: email.to_string(),
            inviter_id: inviter.clone(),
            role: GroupRole::Viewer,
            created_at: now,
            // Deliberately short: activation must replace it.
            expires_at: now + Duration::minutes(1),
            state: InviteState::Dormant,
        })
        .collect();

    s.organization_invites()
        .save_invites(&[parent.clone()])
        .await
        .unwrap();
    s.group_invites().save_invites(&children).await.unwrap();
    let child_ids: Vec<_> = children.iter().map(|c| c.id.clone()).collect();
    s.save_dormant_invite_relations(&parent.id, &child_ids)
        .await
        .unwrap();

    Bundle { parent, children }
}

#[tokio::test]
async fn dormant_children_stay_hidden_until_activated() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let groups = vec![GroupId::generate(), GroupId::generate()];
    let bundle = seed_bundle(&s, "a@example.com", &groups).await;
    let invites = s.group_invites();

    for (child, group) in bundle.children.iter().zip(&groups) {
        assert_eq!(
            invites.retrieve_invite_by_id(&child.id).await.unwrap_err(),
            StoreError::NotFound
        );
        let page = invites
            .retrieve_invites_by_destination(group, &PageParams::new())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }
    let by_inviter = invites
        .retrieve_invites_by_user(UserRole::Inviter, &bundle.parent.inviter_id, &PageParams::new())
        .await
        .unwrap();
    assert_eq!(by_inviter.total, 0);

    let invitee = UserId::generate();
    let expires_at = Utc::now() + Duration::days(7);
    let activated = s
        .activate_group_invites(&bundle.parent.id, &invitee, expires_at)
        .await
        .unwrap();
    assert_eq!(activated.len(), 2);
    for invite in &activated {
        assert_eq!(invite.state, InviteState::Pending);
        assert_eq!(invite.invitee_id.as_ref(), Some(&invitee));
        assert_eq!(invite.expires_at, expires_at);
    }

    for (child, group) in bundle.children.iter().zip(&groups) {
        let stored = invites.retrieve_invite_by_id(&child.id).await.unwrap();
        assert_eq!(stored.state, InviteState::Pending);
        assert_eq!(stored.invitee_id.as_ref(), Some(&invitee));
        assert_eq!(stored.expires_at.timestamp(), expires_at.timestamp());

        let page = invites
            .retrieve_invites_by_destination(group, &PageParams::new().state(InviteState::Pending))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.invites[0].id, child.id);
    }

    let by_invitee = invites
        .retrieve_invites_by_user(UserRole::Invitee, &invitee, &PageParams::new())
        .await
        .unwrap();
    assert_eq!(by_invitee.total, 2);
}

#[tokio::test]
async fn second_activation_changes_nothing() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = GroupId::generate();
    let bundle = seed_bundle(&s, "b@example.com", &[group]).await;
    let invitee = UserId::generate();
    let first_expiry = Utc::now() + Duration::days(7);

    let activated = s
        .activate_group_invites(&bundle.parent.id, &invitee, first_expiry)
        .await
        .unwrap();
    assert_eq!(activated.len(), 1);

    let again = s
        .activate_group_invites(
            &bundle.parent.id,
            &UserId::generate(),
            Utc::now() + Duration::days(30),
        )
        .await
        .unwrap();
    assert!(again.is_empty());

    let stored = s
        .group_invites()
        .retrieve_invite_by_id(&bundle.children[0].id)
        .await
        .unwrap();
    assert_eq!(stored.invitee_id, Some(invitee));
    assert_eq!(stored.expires_at.timestamp(), first_expiry.timestamp());
}

#[tokio::test]
async fn activation_of_unknown_parent_is_empty() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let activated = s
        .activate_group_invites(
            &OrganizationInviteId::generate(),
            &UserId::generate(),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();
    assert!(activated.is_empty());
}

#[tokio::test]
async fn live_invite_supersedes_dormant_child() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let taken = GroupId::generate();
    let free = GroupId::generate();
    let bundle = seed_bundle(&s, "c@example.com", &[taken.clone(), free.clone()]).await;
    let invites = s.group_invites();

    // Dormant rows don't hold the slot, so a direct invite can still be issued.
    let direct = GroupInvite {
        id: GroupInviteId::generate(),
        group_id: taken.clone(),
        invitee_id: None,
        invitee_email: "c@example.com".to_string(),
        inviter_id: UserId::generate(),
        role: GroupRole::Admin,
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(3),
        state: InviteState::Pending,
    };
    invites.save_invites(&[direct.clone()]).await.unwrap();

    let activated = s
        .activate_group_invites(
            &bundle.parent.id,
            &UserId::generate(),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();
    assert_eq!(activated.len(), 1);
    assert_eq!(activated[0].group_id, free);

    let page = invites
        .retrieve_invites_by_destination(&taken, &PageParams::new())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.invites[0].id, direct.id);
    assert_eq!(page.invites[0].role, GroupRole::Admin);

    let superseded = bundle
        .children
        .iter()
        .find(|c| c.group_id == taken)
        .unwrap();
    assert_eq!(
        invites.remove_invite(&superseded.id).await.unwrap_err(),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn stale_occupant_does_not_block_activation() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = GroupId::generate();
    let bundle = seed_bundle(&s, "d@example.com", &[group.clone()]).await;
    let invites = s.group_invites();

    let stale = GroupInvite {
        id: GroupInviteId::generate(),
        group_id: group.clone(),
        invitee_id: None,
        invitee_email: "d@example.com".to_string(),
        inviter_id: UserId::generate(),
        role: GroupRole::Viewer,
        created_at: Utc::now() - Duration::days(8),
        expires_at: Utc::now() - Duration::days(1),
        state: InviteState::Pending,
    };
    invites.save_invites(&[stale.clone()]).await.unwrap();

    let activated = s
        .activate_group_invites(
            &bundle.parent.id,
            &UserId::generate(),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();
    assert_eq!(activated.len(), 1);

    let stale = invites.retrieve_invite_by_id(&stale.id).await.unwrap();
    assert_eq!(stale.state, InviteState::Expired);
}

#[tokio::test]
async fn discard_removes_only_dormant_children() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let bundle = seed_bundle(&s, "e@example.com", &[GroupId::generate(), GroupId::generate()]).await;

    assert_eq!(s.discard_dormant_invites(&bundle.parent.id).await.unwrap(), 2);
    assert_eq!(s.discard_dormant_invites(&bundle.parent.id).await.unwrap(), 0);

    let activated = s
        .activate_group_invites(
            &bundle.parent.id,
            &UserId::generate(),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();
    assert!(activated.is_empty());

    // Activated children are live invites now and are not discarded.
    let other = seed_bundle(&s, "f@example.com", &[GroupId::generate()]).await;
    s.activate_group_invites(&other.parent.id, &UserId::generate(), Utc::now() + Duration::days(7))
        .await
        .unwrap();
    assert_eq!(s.discard_dormant_invites(&other.parent.id).await.unwrap(), 0);
    s.group_invites()
        .retrieve_invite_by_id(&other.children[0].id)
        .await
        .unwrap();
}

#[tokio::test]
async fn links_to_unknown_invites_are_malformed() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let bundle = seed_bundle(&s, "g@example.com", &[]).await;

    let err = s
        .save_dormant_invite_relations(&bundle.parent.id, &[GroupInviteId::generate()])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MalformedInput(_)));

    let orphan = seed_bundle(&s, "h@example.com", &[GroupId::generate()]).await;
    let err = s
        .save_dormant_invite_relations(
            &OrganizationInviteId::generate(),
            &[orphan.children[0].id.clone()],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MalformedInput(_)));
}

#[tokio::test]
async fn removing_parent_drops_dormant_children() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let bundle = seed_bundle(&s, "i@example.com", &[GroupId::generate()]).await;

    s.organization_invites()
        .remove_invite(&bundle.parent.id)
        .await
        .unwrap();

    let activated = s
        .activate_group_invites(
            &bundle.parent.id,
            &UserId::generate(),
            Utc::now() + Duration::days(7),
        )
        .await
        .unwrap();
    assert!(activated.is_empty());

    // The staged row went with its parent.
    assert_eq!(
        s.group_invites()
            .remove_invite(&bundle.children[0].id)
            .await
            .unwrap_err(),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn removing_parent_keeps_activated_children() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let bundle = seed_bundle(&s, "j@example.com", &[GroupId::generate()]).await;
    s.activate_group_invites(
        &bundle.parent.id,
        &UserId::generate(),
        Utc::now() + Duration::days(7),
    )
    .await
    .unwrap();

    s.organization_invites()
        .remove_invite(&bundle.parent.id)
        .await
        .unwrap();

    let child = s
        .group_invites()
        .retrieve_invite_by_id(&bundle.children[0].id)
        .await
        .unwrap();
    assert_eq!(child.state, InviteState::Pending);
}

#[tokio::test]
async fn invite_held_under_another_email_supersedes_dormant_child() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let group = GroupId::generate();
    let bundle = seed_bundle(&s, "home@example.com", &[group.clone()]).await;
    let invites = s.group_invites();
    let user = UserId::generate();

    let held = GroupInvite {
        id: GroupInviteId::generate(),
        group_id: group.clone(),
        invitee_id: Some(user.clone()),
        invitee_email: "work@example.com".to_string(),
        inviter_id: UserId::generate(),
        role: GroupRole::Editor,
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(3),
        state: InviteState::Pending,
    };
    invites.save_invites(&[held.clone()]).await.unwrap();

    let activated = s
        .activate_group_invites(&bundle.parent.id, &user, Utc::now() + Duration::days(7))
        .await
        .unwrap();
    assert!(activated.is_empty());

    let page = invites
        .retrieve_invites_by_user(
            UserRole::Invitee,
            &user,
            &PageParams::new().state(InviteState::Pending),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.invites[0].id, held.id);
}

#[tokio::test]
async fn accept_and_activate_commits_together() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let bundle = seed_bundle(&s, "k@example.com", &[GroupId::generate(), GroupId::generate()]).await;
    let invitee = UserId::generate();
    let expires_at = Utc::now() + Duration::days(7);

    let activated = s
        .accept_and_activate(&bundle.parent.id, &invitee, expires_at)
        .await
        .unwrap();
    assert_eq!(activated.len(), 2);

    let parent = s
        .organization_invites()
        .retrieve_invite_by_id(&bundle.parent.id)
        .await
        .unwrap();
    assert_eq!(parent.state, InviteState::Accepted);
    assert_eq!(parent.invitee_id, Some(invitee.clone()));

    // The parent is no longer pending, so a second acceptance is refused outright.
    assert_eq!(
        s.accept_and_activate(&bundle.parent.id, &invitee, expires_at)
            .await
            .unwrap_err(),
        StoreError::Conflict
    );
    assert_eq!(
        s.accept_and_activate(&OrganizationInviteId::generate(), &invitee, expires_at)
            .await
            .unwrap_err(),
        StoreError::NotFound
    );
}

#[tokio::test]
async fn expired_parent_cannot_be_accepted() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let parent = OrganizationInvite {
        id: OrganizationInviteId::generate(),
        organization_id: OrganizationId::generate(),
        invitee_id: None,
        invitee_email: "l@example.com".to_string(),
        inviter_id: UserId::generate(),
        role: OrganizationRole::Viewer,
        created_at: now - Duration::days(8),
        expires_at: now - Duration::days(1),
        state: InviteState::Pending,
    };
    s.organization_invites()
        .save_invites(&[parent.clone()])
        .await
        .unwrap();

    assert_eq!(
        s.accept_and_activate(&parent.id, &UserId::generate(), now + Duration::days(7))
            .await
            .unwrap_err(),
        StoreError::Conflict
    );
    let stored = s
        .organization_invites()
        .retrieve_invite_by_id(&parent.id)
        .await
        .unwrap();
    assert_eq!(stored.state, InviteState::Expired);
}
