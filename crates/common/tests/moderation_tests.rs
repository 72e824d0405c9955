//! Admin workflows: role and ban changes, cascades and paper deletion

mod common;

use common::{actor, spawn, PASSWORD};
use papervault_common::auth::policy::can_delete_paper;
use papervault_common::errors::ErrorCode;
use papervault_common::services::ModerationOutcome;
use papervault_common::{Actor, AppError};

#[tokio::test]
async fn ban_blocks_login_and_unban_restores_it() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let user = app.register("user1").await;
    let moderation = &app.services.moderation;
    let identity = &app.services.identity;

    let outcome = moderation.ban(admin.id, user.id).await?;
    assert!(outcome.is_applied());
    assert!(outcome.user().banned);
    assert!(matches!(
        identity.authenticate("user1@example.com", PASSWORD).await,
        Err(AppError::Banned)
    ));

    moderation.unban(admin.id, user.id).await?;
    let back = identity.authenticate("user1@example.com", PASSWORD).await?;
    assert_eq!(back.id, user.id);
    Ok(())
}

#[tokio::test]
async fn ban_revokes_existing_sessions() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    app.register("user1").await;
    let identity = &app.services.identity;

    let (user, session) = identity.login("user1@example.com", PASSWORD, true).await?;
    assert!(identity.current_actor(Some(&session.token)).await?.is_authenticated());

    app.services.moderation.ban(admin.id, user.id).await?;
    app.services.moderation.unban(admin.id, user.id).await?;

    // Unbanning does not bring the old session back
    assert!(matches!(
        identity.current_actor(Some(&session.token)).await?,
        Actor::Anonymous
    ));
    Ok(())
}

#[tokio::test]
async fn repeated_changes_report_unchanged() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let user = app.register("user1").await;
    let moderation = &app.services.moderation;

    assert!(moderation.promote(admin.id, user.id).await?.is_applied());
    assert!(matches!(
        moderation.promote(admin.id, user.id).await?,
        ModerationOutcome::Unchanged(_)
    ));

    assert!(moderation.demote(admin.id, user.id).await?.is_applied());
    assert!(matches!(
        moderation.demote(admin.id, user.id).await?,
        ModerationOutcome::Unchanged(_)
    ));

    assert!(matches!(
        moderation.unban(admin.id, user.id).await?,
        ModerationOutcome::Unchanged(_)
    ));
    Ok(())
}

#[tokio::test]
async fn admins_cannot_be_banned_but_can_be_demoted() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin1 = app.admin("admin1").await;
    let admin2 = app.admin("admin2").await;
    let moderation = &app.services.moderation;

    assert!(matches!(
        moderation.ban(admin1.id, admin2.id).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(!app.reload(&admin2).await.banned);

    moderation.demote(admin1.id, admin2.id).await?;
    assert!(!app.reload(&admin2).await.is_admin());
    Ok(())
}

#[tokio::test]
async fn self_moderation_is_forbidden() {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let moderation = &app.services.moderation;

    assert!(matches!(
        moderation.demote(admin.id, admin.id).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(matches!(
        moderation.delete_user(admin.id, admin.id).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(app.reload(&admin).await.is_admin());
}

#[tokio::test]
async fn non_admin_is_forbidden_before_target_lookup() {
    let app = spawn().await;
    let user = app.register("user1").await;
    let moderation = &app.services.moderation;

    // The target does not exist; the caller must still only learn Forbidden
    assert!(matches!(
        moderation.promote(user.id, 9_999).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(matches!(
        moderation.delete_user(user.id, 9_999).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(matches!(
        moderation.list_users(user.id, 1, 10).await,
        Err(AppError::Forbidden { .. })
    ));
}

#[tokio::test]
async fn banned_admin_loses_admin_powers() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin1 = app.admin("admin1").await;
    let user = app.register("user1").await;
    app.credentials.set_banned(admin1.id, true).await?;

    assert!(matches!(
        app.services.moderation.promote(admin1.id, user.id).await,
        Err(AppError::Forbidden { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn missing_target_is_not_found_for_admins() {
    let app = spawn().await;
    let admin = app.admin("admin1").await;

    assert!(matches!(
        app.services.moderation.ban(admin.id, 9_999).await,
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn delete_user_cascades_papers_and_files() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let owner = app.register("owner").await;
    let bystander = app.register("bystander").await;

    let papers = vec![
        app.upload(&owner, "One", "Math", "one.pdf", b"1").await,
        app.upload(&owner, "Two", "Math", "two.pdf", b"2").await,
        app.upload(&owner, "Three", "Math", "three.docx", b"3").await,
    ];
    let kept = app.upload(&bystander, "Kept", "Math", "kept.pdf", b"k").await;
    app.services.identity.login("owner@example.com", PASSWORD, false).await?;

    let report = app.services.moderation.delete_user(admin.id, owner.id).await?;

    assert!(report.is_complete());
    assert_eq!(report.papers_deleted, 3);
    assert_eq!(report.files_removed, 3);
    assert_eq!(report.sessions_revoked, 1);

    for paper in &papers {
        assert!(!app.services.files.exists(&paper.file_path).await);
        assert!(matches!(
            app.services.papers.get(&actor(&admin), paper.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
    assert!(app.credentials.find_by_id(owner.id).await?.is_none());
    assert!(app.services.files.exists(&kept.file_path).await);
    Ok(())
}

#[tokio::test]
async fn delete_user_reports_missing_file_and_still_completes() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let owner = app.register("owner").await;

    let one = app.upload(&owner, "One", "Math", "one.pdf", b"1").await;
    let two = app.upload(&owner, "Two", "Math", "two.pdf", b"2").await;
    let three = app.upload(&owner, "Three", "Math", "three.pdf", b"3").await;

    std::fs::remove_file(app.services.files.resolve(&two.file_path)?)?;

    let report = app.services.moderation.delete_user(admin.id, owner.id).await?;

    assert_eq!(report.papers_deleted, 3);
    assert_eq!(report.files_removed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].paper_id, two.id);
    assert_eq!(report.failures[0].file_path, two.file_path);
    assert_eq!(report.failures[0].code(), ErrorCode::PartialCascadeFailure);

    assert!(!app.services.files.exists(&one.file_path).await);
    assert!(!app.services.files.exists(&three.file_path).await);
    assert!(app.credentials.find_by_id(owner.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn paper_deletion_follows_ownership() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let owner = app.register("owner").await;
    let other = app.register("other").await;
    let moderation = &app.services.moderation;

    let own = app.upload(&owner, "Own", "Math", "own.pdf", b"o").await;
    let by_admin = app.upload(&owner, "Admin", "Math", "admin.pdf", b"a").await;

    assert!(can_delete_paper(&actor(&owner), &own));
    assert!(!can_delete_paper(&actor(&other), &own));
    assert!(can_delete_paper(&actor(&admin), &own));

    assert!(matches!(
        moderation.delete_paper(other.id, own.id).await,
        Err(AppError::Forbidden { .. })
    ));
    assert!(app.services.files.exists(&own.file_path).await);

    let deleted = moderation.delete_paper(owner.id, own.id).await?;
    assert!(deleted.file_removed);
    assert!(!app.services.files.exists(&own.file_path).await);

    let deleted = moderation.delete_paper(admin.id, by_admin.id).await?;
    assert!(deleted.file_removed);
    Ok(())
}

#[tokio::test]
async fn deleted_paper_is_gone_and_redelete_is_not_found() -> anyhow::Result<()> {
    let app = spawn().await;
    let owner = app.register("owner").await;
    let paper = app.upload(&owner, "Own", "Math", "own.pdf", b"o").await;
    let moderation = &app.services.moderation;

    moderation.delete_paper(owner.id, paper.id).await?;

    assert!(matches!(
        app.services.papers.get(&actor(&owner), paper.id).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        moderation.delete_paper(owner.id, paper.id).await,
        Err(AppError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn paper_row_is_deleted_even_when_file_is_missing() -> anyhow::Result<()> {
    let app = spawn().await;
    let owner = app.register("owner").await;
    let paper = app.upload(&owner, "Own", "Math", "own.pdf", b"o").await;
    std::fs::remove_file(app.services.files.resolve(&paper.file_path)?)?;

    let deleted = app.services.moderation.delete_paper(owner.id, paper.id).await?;

    assert!(!deleted.file_removed);
    assert!(matches!(
        app.services.papers.get(&actor(&owner), paper.id).await,
        Err(AppError::NotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn admin_listings_cover_everything() -> anyhow::Result<()> {
    let app = spawn().await;
    let admin = app.admin("admin1").await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    app.upload(&alice, "A", "Math", "a.pdf", b"a").await;
    app.upload(&bob, "B", "Math", "b.pdf", b"b").await;

    let users = app.services.moderation.list_users(admin.id, 1, 10).await?;
    assert_eq!(users.total, 3);
    assert_eq!(users.items[0].id, admin.id);

    let papers = app.services.moderation.list_papers(admin.id, 1, 1).await?;
    assert_eq!(papers.total, 2);
    assert_eq!(papers.items.len(), 1);
    Ok(())
}
