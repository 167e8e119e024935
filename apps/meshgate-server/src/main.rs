use std::sync::Arc;

use clap::{Parser, Subcommand};
use meshgate_onboarding::{
    CreateGroupInvite, CreateOrganizationInvite, GroupGrant, OnboardingConfig, OnboardingService,
    Responder, ResponseAction,
};
use meshgate_storage::{
    DestinationKind, Direction, GroupId, GroupInviteId, GroupRole, InviteEntity, InvitePage,
    InviteState, OrderField, OrganizationId, OrganizationInviteId, OrganizationRole, PageParams,
    UserId, UserRole,
};
use meshgate_store_sqlite::SqliteStore;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "meshgate-server")]
#[command(about = "Meshgate administration CLI for invites and memberships")]
struct Cli {
    /// Database URL (sqlite://path/to/db.db)
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://meshgate.db"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Invite management commands
    Invite {
        #[command(subcommand)]
        invite_cmd: InviteCommand,
    },
}

#[derive(Subcommand)]
enum InviteCommand {
    /// Create an invite
    Create {
        /// organization or group
        #[arg(long)]
        kind: DestinationKind,
        /// Organization or group ID
        #[arg(long)]
        destination: Uuid,
        /// Invitee email
        #[arg(long)]
        email: String,
        /// Role granted on acceptance (admin, editor, viewer)
        #[arg(long, default_value = "viewer")]
        role: String,
        /// User ID of the inviter
        #[arg(long)]
        inviter: Uuid,
        /// User ID of the invitee, when already registered
        #[arg(long)]
        invitee: Option<Uuid>,
        /// Group invite to bundle, as GROUP_ID:ROLE (organization invites only, repeatable)
        #[arg(long = "group", value_parser = parse_grant)]
        groups: Vec<GroupGrant>,
    },
    /// Show an invite
    View {
        #[arg(long)]
        kind: DestinationKind,
        id: Uuid,
    },
    /// List invites by destination or by user
    List {
        #[arg(long)]
        kind: DestinationKind,
        /// Organization or group ID
        #[arg(long, conflicts_with = "user", required_unless_present = "user")]
        destination: Option<Uuid>,
        /// User ID
        #[arg(long)]
        user: Option<Uuid>,
        /// Side of the invite the user is on (inviter or invitee)
        #[arg(long = "as", default_value = "invitee")]
        user_role: UserRole,
        #[arg(long, default_value = "0")]
        offset: u32,
        /// Page size (defaults to MESHGATE_DEFAULT_PAGE_LIMIT)
        #[arg(long)]
        limit: Option<u32>,
        /// created_at, expires_at, state or invitee_email
        #[arg(long, default_value = "created_at")]
        order: OrderField,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        direction: Direction,
        /// Only invites in this state
        #[arg(long)]
        state: Option<InviteState>,
    },
    /// Accept or decline an invite on behalf of a user
    Respond {
        #[arg(long)]
        kind: DestinationKind,
        id: Uuid,
        /// accept or decline
        #[arg(long)]
        action: String,
        /// Responding user ID
        #[arg(long)]
        user: Uuid,
        /// Responding user's email
        #[arg(long)]
        email: String,
    },
    /// Revoke an invite
    Revoke {
        #[arg(long)]
        kind: DestinationKind,
        id: Uuid,
    },
    /// Bind a registered user to the invites sent to their email
    Claim {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        email: String,
    },
}

fn parse_grant(s: &str) -> Result<GroupGrant, String> {
    let (group, role) = s
        .split_once(':')
        .ok_or_else(|| format!("expected GROUP_ID:ROLE, got {:?}", s))?;
    let group_id = Uuid::try_parse(group).map_err(|e| format!("invalid group id: {}", e))?;
    let role = role.parse::<GroupRole>().map_err(|e| e.to_string())?;
    Ok(GroupGrant {
        group_id: GroupId(group_id),
        role,
    })
}

fn page_json<E: InviteEntity>(page: InvitePage<E>) -> Value {
    let invites: Vec<_> = page.invites.iter().map(InviteEntity::to_invite).collect();
    json!({
        "total": page.total,
        "offset": page.offset,
        "limit": page.limit,
        "invites": invites,
    })
}

// ────────────────────────────────────── CLI Commands ──────────────────────────────────────

async fn cmd_invite(
    service: &OnboardingService,
    invite_cmd: InviteCommand,
) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match invite_cmd {
        InviteCommand::Create {
            kind,
            destination,
            email,
            role,
            inviter,
            invitee,
            groups,
        } => {
            let inviter = UserId(inviter);
            let invitee_id = invitee.map(UserId);
            match kind {
                DestinationKind::Organization => {
                    let invite = service
                        .create_organization_invite(
                            &inviter,
                            CreateOrganizationInvite {
                                organization_id: OrganizationId(destination),
                                invitee_email: email,
                                invitee_id,
                                role: role.parse::<OrganizationRole>()?,
                                groups,
                            },
                        )
                        .await?;
                    json!(invite.to_invite())
                }
                DestinationKind::Group => {
                    if !groups.is_empty() {
                        return Err("--group only applies to organization invites".into());
                    }
                    let invite = service
                        .create_group_invite(
                            &inviter,
                            CreateGroupInvite {
                                group_id: GroupId(destination),
                                invitee_email: email,
                                invitee_id,
                                role: role.parse::<GroupRole>()?,
                            },
                        )
                        .await?;
                    json!(invite.to_invite())
                }
            }
        }
        InviteCommand::View { kind, id } => match kind {
            DestinationKind::Organization => {
                let invite = service
                    .view_organization_invite(&OrganizationInviteId(id))
                    .await?;
                json!(invite.to_invite())
            }
            DestinationKind::Group => {
                let invite = service.view_group_invite(&GroupInviteId(id)).await?;
                json!(invite.to_invite())
            }
        },
        InviteCommand::List {
            kind,
            destination,
            user,
            user_role,
            offset,
            limit,
            order,
            direction,
            state,
        } => {
            let mut page = service
                .page_params()
                .offset(offset)
                .order(order)
                .direction(direction);
            if let Some(limit) = limit {
                page = page.limit(limit);
            }
            if let Some(state) = state {
                page = page.state(state);
            }
            list_invites(service, kind, destination, user, user_role, &page).await?
        }
        InviteCommand::Respond {
            kind,
            id,
            action,
            user,
            email,
        } => {
            let action: ResponseAction = action.parse()?;
            let responder = Responder {
                user_id: UserId(user),
                email,
            };
            match kind {
                DestinationKind::Organization => {
                    let response = service
                        .respond_organization_invite(
                            &responder,
                            &OrganizationInviteId(id),
                            action,
                        )
                        .await?;
                    let activated: Vec<_> =
                        response.activated.iter().map(|g| g.to_invite()).collect();
                    json!({
                        "invite": response.invite.to_invite(),
                        "activated": activated,
                    })
                }
                DestinationKind::Group => {
                    let invite = service
                        .respond_group_invite(&responder, &GroupInviteId(id), action)
                        .await?;
                    json!(invite.to_invite())
                }
            }
        }
        InviteCommand::Revoke { kind, id } => {
            match kind {
                DestinationKind::Organization => {
                    service
                        .revoke_organization_invite(&OrganizationInviteId(id))
                        .await?
                }
                DestinationKind::Group => service.revoke_group_invite(&GroupInviteId(id)).await?,
            }
            json!({ "revoked": id })
        }
        InviteCommand::Claim { user, email } => {
            let claimed = service.claim_invites(&UserId(user), &email).await?;
            json!({ "claimed": claimed })
        }
    };

    Ok(output)
}

async fn list_invites(
    service: &OnboardingService,
    kind: DestinationKind,
    destination: Option<Uuid>,
    user: Option<Uuid>,
    user_role: UserRole,
    page: &PageParams,
) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match (kind, destination, user) {
        (DestinationKind::Organization, Some(destination), _) => page_json(
            service
                .list_organization_invites(&OrganizationId(destination), page)
                .await?,
        ),
        (DestinationKind::Group, Some(destination), _) => page_json(
            service
                .list_group_invites(&GroupId(destination), page)
                .await?,
        ),
        (DestinationKind::Organization, None, Some(user)) => page_json(
            service
                .list_organization_invites_by_user(user_role, &UserId(user), page)
                .await?,
        ),
        (DestinationKind::Group, None, Some(user)) => page_json(
            service
                .list_group_invites_by_user(user_role, &UserId(user), page)
                .await?,
        ),
        (_, None, None) => return Err("either --destination or --user is required".into()),
    };
    Ok(output)
}

fn onboarding_service(store: &SqliteStore, config: OnboardingConfig) -> OnboardingService {
    OnboardingService::new(
        Arc::new(store.organization_invites()),
        Arc::new(store.group_invites()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config,
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = OnboardingConfig::from_env()?;
    debug!(?config, database_url = %cli.database_url, "starting");

    let store = SqliteStore::open(&cli.database_url).await?;
    let service = onboarding_service(&store, config);

    let result = match cli.command {
        Command::Invite { invite_cmd } => cmd_invite(&service, invite_cmd).await,
    };
    store.close().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

// ────────────────────────────────────── Tests ──────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> OnboardingService {
        let store = SqliteStore::open_in_memory().await.unwrap();
        onboarding_service(&store, OnboardingConfig::default())
    }

    fn invite_cmd(args: &[&str]) -> InviteCommand {
        let mut argv = vec!["meshgate-server", "invite"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Invite { invite_cmd } => invite_cmd,
        }
    }

    async fn run(service: &OnboardingService, args: &[&str]) -> Value {
        cmd_invite(service, invite_cmd(args)).await.unwrap()
    }

    #[test]
    fn test_parse_grant() {
        let id = Uuid::now_v7();
        let grant = parse_grant(&format!("{}:editor", id)).unwrap();
        assert_eq!(grant.group_id, GroupId(id));
        assert_eq!(grant.role, GroupRole::Editor);

        assert!(parse_grant("no-separator").is_err());
        assert!(parse_grant("not-a-uuid:viewer").is_err());
        assert!(parse_grant(&format!("{}:owner", id)).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_values() {
        let id = Uuid::now_v7().to_string();
        let id = id.as_str();
        for args in [
            vec!["meshgate-server", "invite", "view", "--kind", "team", id],
            vec![
                "meshgate-server",
                "invite",
                "list",
                "--kind",
                "group",
                "--destination",
                id,
                "--order",
                "name",
            ],
            vec![
                "meshgate-server",
                "invite",
                "list",
                "--kind",
                "group",
                "--destination",
                id,
                "--state",
                "archived",
            ],
        ] {
            assert!(Cli::try_parse_from(args).is_err());
        }
    }

    #[tokio::test]
    async fn test_bundle_flow_through_cli() {
        let service = setup().await;
        let org = Uuid::now_v7().to_string();
        let group = Uuid::now_v7().to_string();
        let inviter = Uuid::now_v7().to_string();
        let invitee = Uuid::now_v7().to_string();
        let grant = format!("{}:editor", group);

        let created = run(
            &service,
            &[
                "create",
                "--kind",
                "org",
                "--destination",
                &org,
                "--email",
                "new@example.com",
                "--role",
                "admin",
                "--inviter",
                &inviter,
                "--group",
                &grant,
            ],
        )
        .await;
        assert_eq!(created["state"], "pending");
        assert_eq!(created["invitee_role"], "admin");
        let id = created["id"].as_str().unwrap().to_string();

        let listed = run(
            &service,
            &["list", "--kind", "organization", "--destination", &org],
        )
        .await;
        assert_eq!(listed["total"], 1);
        assert_eq!(listed["limit"], 10);

        let response = run(
            &service,
            &[
                "respond",
                "--kind",
                "organization",
                &id,
                "--action",
                "accept",
                "--user",
                &invitee,
                "--email",
                "new@example.com",
            ],
        )
        .await;
        assert_eq!(response["invite"]["state"], "accepted");
        assert_eq!(response["activated"].as_array().unwrap().len(), 1);
        assert_eq!(response["activated"][0]["invitee_id"], invitee.as_str());

        let groups = run(
            &service,
            &[
                "list", "--kind", "group", "--user", &invitee, "--as", "invitee", "--state",
                "pending",
            ],
        )
        .await;
        assert_eq!(groups["total"], 1);
        assert_eq!(groups["invites"][0]["destination_id"], group.as_str());
    }

    #[tokio::test]
    async fn test_revoke_and_claim() {
        let service = setup().await;
        let group = Uuid::now_v7().to_string();
        let inviter = Uuid::now_v7().to_string();

        let created = run(
            &service,
            &[
                "create",
                "--kind",
                "group",
                "--destination",
                &group,
                "--email",
                "x@example.com",
                "--inviter",
                &inviter,
            ],
        )
        .await;
        assert_eq!(created["invitee_role"], "viewer");

        let user = Uuid::now_v7().to_string();
        let claimed = run(
            &service,
            &["claim", "--user", &user, "--email", "X@example.com"],
        )
        .await;
        assert_eq!(claimed["claimed"], 1);

        let id = created["id"].as_str().unwrap().to_string();
        let revoked = run(&service, &["revoke", "--kind", "group", &id]).await;
        assert_eq!(revoked["revoked"], id.as_str());

        let err = cmd_invite(&service, invite_cmd(&["view", "--kind", "group", &id]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_group_invite_rejects_bundles() {
        let service = setup().await;
        let group = Uuid::now_v7().to_string();
        let grant = format!("{}:viewer", Uuid::now_v7());
        let inviter = Uuid::now_v7().to_string();

        let cmd = invite_cmd(&[
            "create",
            "--kind",
            "group",
            "--destination",
            &group,
            "--email",
            "y@example.com",
            "--inviter",
            &inviter,
            "--group",
            &grant,
        ]);
        assert!(cmd_invite(&service, cmd).await.is_err());
    }
}
