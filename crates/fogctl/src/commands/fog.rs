use clap::Subcommand;
use tracing::info;
use uuid::Uuid;

use fogplane_control::epoch_secs;
use fogplane_state::{Fog, FogAccessToken, StateRead, StateStore};

use super::{Context, print_json};

#[derive(Subcommand)]
pub enum FogAction {
    /// Register a fog node and issue its agent token
    Add {
        #[arg(long)]
        name: String,
        /// Node architecture, matched against catalog item images.
        #[arg(long, default_value = "1")]
        fog_type: u32,
        /// Fog uuid; generated when omitted.
        #[arg(long)]
        uuid: Option<String>,
        /// Agent access token; generated when omitted.
        #[arg(long)]
        token: Option<String>,
        /// Leave the node unowned so every user may place on it.
        #[arg(long)]
        shared: bool,
    },
    /// List fog nodes
    List,
    /// Remove a fog node; its microservices lose their placement
    Remove { uuid: String },
}

pub fn run(ctx: &Context, action: FogAction) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    match action {
        FogAction::Add {
            name,
            fog_type,
            uuid,
            token,
            shared,
        } => {
            let fog = Fog {
                uuid: uuid.unwrap_or_else(|| Uuid::new_v4().to_string()),
                name,
                user_id: (!shared).then_some(ctx.user_id),
                fog_type_id: fog_type,
                created_at: epoch_secs(),
            };
            let access = FogAccessToken {
                token: token.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
                fog_uuid: fog.uuid.clone(),
            };
            add_fog(&store, &fog, &access)?;
            println!("✓ Registered fog {}", fog.uuid);
            println!("  Token: {}", access.token);
            Ok(())
        }
        FogAction::List => print_json(&store.snapshot()?.fogs()?),
        FogAction::Remove { uuid } => {
            if remove_fog(&store, &uuid)? {
                println!("✓ Removed fog {uuid}");
                Ok(())
            } else {
                anyhow::bail!("fog {uuid} not found")
            }
        }
    }
}

fn add_fog(store: &StateStore, fog: &Fog, access: &FogAccessToken) -> anyhow::Result<()> {
    store.transaction(|txn| -> anyhow::Result<()> {
        if txn.fog(&fog.uuid)?.is_some() {
            anyhow::bail!("fog {} already exists", fog.uuid);
        }
        txn.put_fog(fog)?;
        txn.put_fog_access_token(access)?;
        Ok(())
    })?;
    info!(uuid = %fog.uuid, fog_type = fog.fog_type_id, "fog registered");
    Ok(())
}

fn remove_fog(store: &StateStore, uuid: &str) -> anyhow::Result<bool> {
    let removed = store.transaction(|txn| txn.delete_fog(uuid))?;
    if removed {
        info!(%uuid, "fog removed");
    }
    Ok(removed)
}
