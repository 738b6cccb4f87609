use std::path::PathBuf;

use clap::{Args, Subcommand};

use fogplane_control::{MicroserviceManager, MicroserviceUpdate, NewMicroservice};

use super::{Context, print_json, read_json_file};

#[derive(Subcommand)]
pub enum MicroserviceAction {
    /// Create a microservice
    Add(AddArgs),
    /// Update a microservice; only the flags given are changed
    Update(UpdateArgs),
    /// Delete a microservice and its routes
    Remove { uuid: String },
    /// List your microservices
    List,
    /// Show one microservice
    Info { uuid: String },
    /// Manage routes between microservices
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },
}

#[derive(Subcommand)]
pub enum RouteAction {
    /// Route SOURCE's output to DEST
    Add { source: String, dest: String },
    /// Remove the route SOURCE -> DEST
    Remove { source: String, dest: String },
    /// List outbound routes of a microservice
    List { uuid: String },
    /// Re-provision routes whose bridges or placement drifted
    Repair,
}

#[derive(Args)]
pub struct AddArgs {
    /// JSON file with the microservice definition; flags override its fields.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long, required_unless_present = "file")]
    name: Option<String>,
    #[arg(long, required_unless_present = "file")]
    catalog_id: Option<u64>,
    /// Fog node to place the microservice on.
    #[arg(long)]
    fog: Option<String>,
    #[arg(long)]
    flow_id: Option<u64>,
    #[arg(long)]
    config: Option<String>,
    /// Port mappings, internal:external[:tunnel].
    #[arg(long, num_args = 1..)]
    ports: Vec<String>,
    /// Volume mappings, hostPath:containerPath[:rw|ro].
    #[arg(long, num_args = 1..)]
    volumes: Vec<String>,
    /// Destination microservices to route to.
    #[arg(long, num_args = 1..)]
    routes: Vec<String>,
    #[arg(long)]
    log_limit: Option<u32>,
    #[arg(long)]
    root_enable: bool,
    #[arg(long)]
    root_disable: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    uuid: String,
    /// JSON file with the fields to change.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    catalog_id: Option<u64>,
    #[arg(long)]
    fog: Option<String>,
    #[arg(long)]
    flow_id: Option<u64>,
    #[arg(long)]
    config: Option<String>,
    /// Replace port mappings; pass with no value to clear them.
    #[arg(long, num_args = 0..)]
    ports: Option<Vec<String>>,
    /// Replace volume mappings; pass with no value to clear them.
    #[arg(long, num_args = 0..)]
    volumes: Option<Vec<String>>,
    #[arg(long)]
    log_limit: Option<u32>,
    #[arg(long)]
    root_enable: bool,
    #[arg(long)]
    root_disable: bool,
}

impl AddArgs {
    /// Flags override fields read from `--file`.
    fn into_request(self) -> anyhow::Result<NewMicroservice> {
        let mut request: NewMicroservice = match &self.file {
            Some(path) => read_json_file(path)?,
            None => NewMicroservice::default(),
        };
        if let Some(name) = self.name {
            request.name = name;
        }
        if let Some(id) = self.catalog_id {
            request.catalog_item_id = id;
        }
        request.iofog_uuid = self.fog.or(request.iofog_uuid);
        request.flow_id = self.flow_id.or(request.flow_id);
        if let Some(config) = self.config {
            request.config = config;
        }
        if !self.ports.is_empty() {
            request.ports = self.ports;
        }
        if !self.volumes.is_empty() {
            request.volume_mappings = self.volumes;
        }
        if !self.routes.is_empty() {
            request.routes = self.routes;
        }
        if let Some(limit) = self.log_limit {
            request.log_limit = limit;
        }
        request.root_enable |= self.root_enable;
        request.root_disable |= self.root_disable;
        Ok(request)
    }
}

impl UpdateArgs {
    /// Flags override fields read from `--file`.
    fn into_update(self) -> anyhow::Result<(String, MicroserviceUpdate)> {
        let mut update: MicroserviceUpdate = match &self.file {
            Some(path) => read_json_file(path)?,
            None => MicroserviceUpdate::default(),
        };
        update.name = self.name.or(update.name);
        update.catalog_item_id = self.catalog_id.or(update.catalog_item_id);
        update.iofog_uuid = self.fog.or(update.iofog_uuid);
        update.flow_id = self.flow_id.or(update.flow_id);
        update.config = self.config.or(update.config);
        update.ports = self.ports.or(update.ports);
        update.volume_mappings = self.volumes.or(update.volume_mappings);
        update.log_limit = self.log_limit.or(update.log_limit);
        update.root_enable |= self.root_enable;
        update.root_disable |= self.root_disable;
        Ok((self.uuid, update))
    }
}

pub fn run(ctx: &Context, action: MicroserviceAction) -> anyhow::Result<()> {
    let manager = MicroserviceManager::new(ctx.open_store()?, ctx.settings());
    let user = ctx.user_id;

    match action {
        MicroserviceAction::Add(args) => {
            let details = manager.create(user, args.into_request()?)?;
            println!("✓ Created microservice {}", details.microservice.uuid);
            print_json(&details)
        }
        MicroserviceAction::Update(args) => {
            let (uuid, update) = args.into_update()?;
            let details = manager.update(user, &uuid, update)?;
            println!("✓ Updated microservice {uuid}");
            print_json(&details)
        }
        MicroserviceAction::Remove { uuid } => {
            manager.delete(user, &uuid)?;
            println!("✓ Removed microservice {uuid}");
            Ok(())
        }
        MicroserviceAction::List => print_json(&manager.list(user)?),
        MicroserviceAction::Info { uuid } => print_json(&manager.get(user, &uuid)?),
        MicroserviceAction::Route { action } => match action {
            RouteAction::Add { source, dest } => {
                let routing = manager.add_route(user, &source, &dest)?;
                println!("✓ Route {source} -> {dest}");
                print_json(&routing)
            }
            RouteAction::Remove { source, dest } => {
                manager.remove_route(user, &source, &dest)?;
                println!("✓ Removed route {source} -> {dest}");
                Ok(())
            }
            RouteAction::List { uuid } => print_json(&manager.routes_for(user, &uuid)?),
            RouteAction::Repair => print_json(&manager.topology().repair_routes()?),
        },
    }
}
