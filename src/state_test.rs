use super::*;

use uuid::Uuid;

fn identity_with_metadata(metadata: serde_json::Value) -> Identity {
    Identity { id: Uuid::nil(), email: Some("a@b.com".into()), metadata }
}

fn profile_with_role(role: Option<Role>) -> Profile {
    Profile {
        user_id: Uuid::nil(),
        display_name: "a".into(),
        role,
        created_at: 0,
        updated_at: 0,
    }
}

fn snapshot_with_role(role: Option<Role>) -> AuthSnapshot {
    AuthSnapshot {
        identity: Some(identity_with_metadata(serde_json::Value::Null)),
        profile: Some(profile_with_role(role)),
        initialized: true,
        ..AuthSnapshot::default()
    }
}

// =============================================================================
// role flags — admin ⊇ editor ⊇ reviewer
// =============================================================================

#[test]
fn editor_flags() {
    let snapshot = snapshot_with_role(Some(Role::Editor));
    assert!(!snapshot.is_admin());
    assert!(snapshot.is_editor());
    assert!(snapshot.is_reviewer());
}

#[test]
fn admin_flags() {
    let snapshot = snapshot_with_role(Some(Role::Admin));
    assert!(snapshot.is_admin());
    assert!(snapshot.is_editor());
    assert!(snapshot.is_reviewer());
}

#[test]
fn reviewer_flags() {
    let snapshot = snapshot_with_role(Some(Role::Reviewer));
    assert!(!snapshot.is_admin());
    assert!(!snapshot.is_editor());
    assert!(snapshot.is_reviewer());
}

#[test]
fn absent_role_with_no_hint_clears_all_flags() {
    let snapshot = snapshot_with_role(None);
    assert!(!snapshot.is_admin());
    assert!(!snapshot.is_editor());
    assert!(!snapshot.is_reviewer());
}

#[test]
fn default_snapshot_has_no_flags() {
    let snapshot = AuthSnapshot::default();
    assert!(!snapshot.is_admin());
    assert!(!snapshot.is_editor());
    assert!(!snapshot.is_reviewer());
    assert!(!snapshot.is_authenticated());
}

// =============================================================================
// effective_role precedence
// =============================================================================

#[test]
fn profile_role_wins_over_metadata() {
    let mut snapshot = snapshot_with_role(Some(Role::Analyst));
    snapshot.identity = Some(identity_with_metadata(serde_json::json!({ "role": "admin" })));
    assert_eq!(snapshot.effective_role(), Some(Role::Analyst));
}

#[test]
fn metadata_fallback_applies_only_without_profile() {
    let snapshot = AuthSnapshot {
        identity: Some(identity_with_metadata(serde_json::json!({ "role": "editor" }))),
        profile: None,
        initialized: true,
        ..AuthSnapshot::default()
    };
    assert_eq!(snapshot.effective_role(), Some(Role::Editor));
    assert!(snapshot.is_editor());
}

#[test]
fn present_profile_without_role_ignores_metadata() {
    let mut snapshot = snapshot_with_role(None);
    snapshot.identity = Some(identity_with_metadata(serde_json::json!({ "role": "admin" })));
    assert_eq!(snapshot.effective_role(), None);
}

#[test]
fn authenticated_tracks_identity_presence() {
    let snapshot = snapshot_with_role(Some(Role::Reviewer));
    assert!(snapshot.is_authenticated());
    assert!(!AuthSnapshot::default().is_authenticated());
}
