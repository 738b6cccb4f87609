use std::path::PathBuf;

use clap::Subcommand;

use fogplane_control::{CatalogResolver, NewCatalogItem};

use super::{Context, print_json, read_json_file};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List catalog items visible to you
    List,
    /// Show one catalog item
    Info { id: u64 },
    /// Register a catalog item from a JSON definition
    Add {
        #[arg(long)]
        file: PathBuf,
        /// Publish to every user instead of keeping it private.
        #[arg(long)]
        public: bool,
    },
}

pub fn run(ctx: &Context, action: CatalogAction) -> anyhow::Result<()> {
    let catalog = CatalogResolver::new(ctx.open_store()?);

    match action {
        CatalogAction::List => print_json(&catalog.list_visible(ctx.user_id)?),
        CatalogAction::Info { id } => print_json(&catalog.get_visible(id, ctx.user_id)?),
        CatalogAction::Add { file, public } => {
            let item: NewCatalogItem = read_json_file(&file)?;
            let owner = if public { None } else { Some(ctx.user_id) };
            let details = catalog.add(item, owner)?;
            println!("✓ Registered catalog item {}", details.id);
            print_json(&details)
        }
    }
}
