use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use voxlink::api::{
    abi, ApiResult, ApiTable, ChannelId, ConnectionHandle, ErrorCode, ErrorRaw, HostExecutor,
    MumbleApiV1_2, PluginApi, PluginId, UserId, Version,
};
use voxlink::host::{
    AudioSettings, HostContext, RecordingAudio, RecordingControls, SessionSnapshot,
};
use voxlink::plugins::PluginRegistry;
use voxlink::{config, logging, Config};

/// `voxlink` - plugin API host of a voice-chat client.
#[derive(Parser, Debug)]
#[command(name = "voxlink")]
#[command(version)]
#[command(about = "Plugin API host: versioned C tables, host-thread dispatch, lent-buffer curation.", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration as TOML
    Config,

    /// List pre-registered plugins as JSON
    Plugins,

    /// Drive a read sweep through the C table against an offline session
    Probe {
        /// Session snapshot (TOML)
        #[arg(long)]
        session: PathBuf,

        /// Configured plugin id to call as
        #[arg(long)]
        plugin: Option<PluginId>,

        /// Name to register under when no `--plugin` is given
        #[arg(long, default_value = "voxlink-probe")]
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(&config.logging.level)?;

    match cli.command {
        Commands::Config => {
            if let Some(path) = cli.config.clone().or_else(config::default_path) {
                tracing::debug!(path = %path.display(), "Resolved config path");
            }
            print!("{}", config.to_toml().context("failed to render configuration")?);
            Ok(())
        }
        Commands::Plugins => {
            let registry = PluginRegistry::new(&config.plugins);
            println!("{}", serde_json::to_string_pretty(&registry.infos())?);
            Ok(())
        }
        Commands::Probe {
            session,
            plugin,
            name,
        } => {
            let report = probe(&config, &session, plugin, &name)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.leaks > 0 {
                bail!("{} buffer(s) were never freed", report.leaks);
            }
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct UserReport {
    id: UserId,
    name: Result<String, String>,
    channel: Result<ChannelId, String>,
    comment: Result<String, String>,
}

#[derive(Debug, Serialize)]
struct ChannelReport {
    id: ChannelId,
    name: Result<String, String>,
    members: Result<Vec<UserId>, String>,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    plugin: PluginId,
    connection: ConnectionHandle,
    synchronized: Result<bool, String>,
    local_user: Result<UserId, String>,
    server_hash: Result<String, String>,
    transmission_mode: Result<i32, String>,
    users: Vec<UserReport>,
    channels: Vec<ChannelReport>,
    leaks: usize,
}

fn probe(
    config: &Config,
    session: &std::path::Path,
    plugin: Option<PluginId>,
    name: &str,
) -> Result<ProbeReport> {
    let snapshot = SessionSnapshot::load(session)?;
    let registry = Arc::new(PluginRegistry::new(&config.plugins));
    if !registry.is_enabled() {
        bail!("the plugin system is disabled; set [plugins] enabled = true");
    }
    let (plugin, registered_here) = match plugin.or_else(|| registry.find_by_name(name)) {
        Some(id) if registry.get(id).is_some() => (id, false),
        Some(id) => bail!("plugin {id} is not registered; add it under [[plugins.registered]]"),
        None => {
            let id = registry
                .register(name, Some(env!("CARGO_PKG_VERSION")))
                .context("failed to register probe plugin")?;
            (id, true)
        }
    };
    let bound = registry
        .bind_api(plugin, Version::new(1, 2, 0))
        .map_err(|code| anyhow::anyhow!("failed to bind API table: {code}"))?;
    tracing::debug!(plugin_id = plugin, version = %bound.version(), "Bound API table");
    let ApiTable::V1_2(table) = bound else {
        bail!("expected the 1.2 API table");
    };

    let mut context = HostContext::new(registry.clone(), AudioSettings::from_config(&config.audio))
        .with_blobs(Arc::new(snapshot.blob_store()?))
        .with_client(Arc::new(RecordingControls::default()))
        .with_audio(Arc::new(RecordingAudio::default()));
    context.connect(Arc::new(snapshot.link()?), Arc::new(snapshot.directory()));
    if let Some(local) = snapshot.local_user {
        context.synchronize(local);
    }

    let executor = HostExecutor::spawn(context).context("failed to start host thread")?;
    let previous = abi::install(PluginApi::new(executor.handle()));
    let sweep = Sweep { table, plugin };
    let mut report = sweep.run();
    abi::uninstall();
    if let Some(previous) = previous {
        abi::install(previous);
    }

    let leaks = executor.shutdown();
    if registered_here {
        registry.unregister(plugin);
    }
    report.leaks = leaks.len();
    Ok(report)
}

struct Sweep {
    table: MumbleApiV1_2,
    plugin: PluginId,
}

fn status(raw: ErrorRaw) -> ApiResult<()> {
    ErrorCode::from_raw(raw).unwrap_or(Err(ErrorCode::GenericError))
}

fn shown<T>(result: ApiResult<T>) -> Result<T, String> {
    result.map_err(|code| code.to_string())
}

impl Sweep {
    fn run(&self) -> ProbeReport {
        let t = &self.table;
        let p = self.plugin;

        let mut connection: ConnectionHandle = -1;
        let connected = status(unsafe { (t.get_active_server_connection)(p, &mut connection) });
        let synchronized = connected.and_then(|()| {
            let mut synchronized = false;
            status(unsafe { (t.is_connection_synchronized)(p, connection, &mut synchronized) })
                .map(|()| synchronized)
        });

        let mut local_user: UserId = 0;
        let local_user = status(unsafe { (t.get_local_user_id)(p, connection, &mut local_user) })
            .map(|()| local_user);

        let server_hash = self.text(|out| unsafe { (t.get_server_hash)(p, connection, out) });

        let mut mode = 0;
        let transmission_mode =
            status(unsafe { (t.get_local_user_transmission_mode)(p, &mut mode) }).map(|()| mode);

        let users = self
            .ids(|items, count| unsafe { (t.get_all_users)(p, connection, items, count) })
            .unwrap_or_default()
            .into_iter()
            .map(|id| {
                let mut channel: ChannelId = -1;
                UserReport {
                    id,
                    name: shown(self.text(|out| unsafe { (t.get_user_name)(p, connection, id, out) })),
                    channel: shown(
                        status(unsafe { (t.get_channel_of_user)(p, connection, id, &mut channel) })
                            .map(|()| channel),
                    ),
                    comment: shown(
                        self.text(|out| unsafe { (t.get_user_comment)(p, connection, id, out) }),
                    ),
                }
            })
            .collect();

        let channels = self
            .ids(|items, count| unsafe { (t.get_all_channels)(p, connection, items, count) })
            .unwrap_or_default()
            .into_iter()
            .map(|id| ChannelReport {
                id,
                name: shown(self.text(|out| unsafe { (t.get_channel_name)(p, connection, id, out) })),
                members: shown(self.ids(|items, count| unsafe {
                    (t.get_users_in_channel)(p, connection, id, items, count)
                })),
            })
            .collect();

        ProbeReport {
            plugin: p,
            connection,
            synchronized: shown(synchronized),
            local_user: shown(local_user),
            server_hash: shown(server_hash),
            transmission_mode: shown(transmission_mode),
            users,
            channels,
            leaks: 0,
        }
    }

    /// Call a string getter, copy the result and hand the buffer back.
    fn text(&self, call: impl FnOnce(*mut *const c_char) -> ErrorRaw) -> ApiResult<String> {
        let mut out: *const c_char = ptr::null();
        status(call(&mut out))?;
        // SAFETY: on success the host wrote a live NUL-terminated buffer.
        let text = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
        self.free(out.cast());
        Ok(text)
    }

    /// Call an array getter, copy the result and hand the buffer back.
    fn ids<T: Copy>(&self, call: impl FnOnce(*mut *mut T, *mut usize) -> ErrorRaw) -> ApiResult<Vec<T>> {
        let mut items: *mut T = ptr::null_mut();
        let mut count = 0usize;
        status(call(&mut items, &mut count))?;
        // SAFETY: on success the host wrote a live buffer of `count` items.
        let values = unsafe { std::slice::from_raw_parts(items, count) }.to_vec();
        self.free(items.cast_const().cast());
        Ok(values)
    }

    fn free(&self, pointer: *const std::ffi::c_void) {
        if let Err(code) = status(unsafe { (self.table.free_memory)(self.plugin, pointer) }) {
            tracing::warn!(error = %code, "Failed to free lent buffer");
        }
    }
}
