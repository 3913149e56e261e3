//! Drives the C function tables end to end: table -> blocking wrapper ->
//! host thread -> curator.

use parking_lot::Mutex;
use std::ffi::{c_char, CStr};
use std::ptr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use voxlink::api::abi::{self, api_table_v1_0, api_table_v1_2};
use voxlink::api::{ConnectionHandle, ErrorCode, HostExecutor, PluginApi, UserId, STATUS_OK};
use voxlink::config::{PluginsConfig, RegisteredPlugin};
use voxlink::host::{
    AudioSettings, ChannelRecord, Directory, HostContext, RecordingAudio, RecordingLink,
    UserRecord,
};
use voxlink::plugins::PluginRegistry;

const PLUGIN: u32 = 3;

// The installed API is process-wide; tests touching it run one at a time.
static ABI: Mutex<()> = parking_lot::const_mutex(());

enum Session {
    None,
    Connected,
    Synchronized,
}

struct Host {
    executor: HostExecutor,
    connection: ConnectionHandle,
    link: Arc<RecordingLink>,
    audio: Arc<RecordingAudio>,
}

fn user(session: UserId, name: &str, channel: i32) -> UserRecord {
    UserRecord {
        session,
        name: name.into(),
        hash: format!("{session:040x}"),
        comment: String::new(),
        comment_hash: Vec::new(),
        channel: Some(channel),
        local_mute: false,
    }
}

fn start(session: Session) -> Host {
    let registry = PluginRegistry::new(&PluginsConfig {
        enabled: true,
        registered: vec![RegisteredPlugin {
            id: PLUGIN,
            name: "Scout".into(),
            version: None,
            enabled: true,
        }],
    });

    let directory = Arc::new(Directory::new());
    directory.upsert_channel(ChannelRecord {
        id: 0,
        name: "Root".into(),
        description: String::new(),
        description_hash: Vec::new(),
    });
    directory.upsert_user(user(1, "Me", 0));
    directory.upsert_user(user(42, "Alice", 0));

    let link = Arc::new(RecordingLink::new(voxlink::api::Version::new(1, 5, 0), vec![1, 2]));
    let audio = Arc::new(RecordingAudio::default());
    let mut context = HostContext::new(Arc::new(registry), AudioSettings::default())
        .with_audio(audio.clone());

    let mut connection = -1;
    if !matches!(session, Session::None) {
        connection = context.connect(link.clone(), directory);
    }
    if matches!(session, Session::Synchronized) {
        context.synchronize(1);
    }

    Host {
        executor: HostExecutor::spawn(context).unwrap(),
        connection,
        link,
        audio,
    }
}

fn install(host: &Host) -> impl Drop {
    let lock = ABI.lock();
    abi::install(PluginApi::new(host.executor.handle()));
    scopeguard::guard(lock, |_| {
        abi::uninstall();
    })
}

unsafe fn text(ptr: *const c_char) -> &'static [u8] {
    CStr::from_ptr(ptr).to_bytes_with_nul()
}

#[test]
fn no_active_connection() {
    let host = start(Session::None);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let mut connection: ConnectionHandle = 77;
    let status = unsafe { (table.get_active_server_connection)(PLUGIN, &mut connection) };
    assert_eq!(status, ErrorCode::NoActiveConnection.raw());
    assert_eq!(connection, 77, "out-param untouched on failure");
}

#[test]
fn unsynchronized_connection() {
    let host = start(Session::Connected);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let mut synchronized = true;
    let status =
        unsafe { (table.is_connection_synchronized)(PLUGIN, host.connection, &mut synchronized) };
    assert_eq!(status, STATUS_OK);
    assert!(!synchronized);

    let mut local: UserId = 0;
    let status = unsafe { (table.get_local_user_id)(PLUGIN, host.connection, &mut local) };
    assert_eq!(status, ErrorCode::ConnectionUnsynchronized.raw());
}

#[test]
fn user_name_then_free_then_double_free() {
    let host = start(Session::Synchronized);
    let installed = install(&host);
    let table = api_table_v1_2();

    let mut name: *const c_char = ptr::null();
    let status = unsafe { (table.get_user_name)(PLUGIN, host.connection, 42, &mut name) };
    assert_eq!(status, STATUS_OK);
    assert_eq!(unsafe { text(name) }, b"Alice\0");

    assert_eq!(unsafe { (table.free_memory)(PLUGIN, name.cast()) }, STATUS_OK);
    assert_eq!(
        unsafe { (table.free_memory)(PLUGIN, name.cast()) },
        ErrorCode::PointerNotFound.raw()
    );
    drop(installed);
    assert!(host.executor.shutdown().is_empty());
}

#[test]
fn repeated_reads_are_identical() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let table = api_table_v1_0();

    let mut first: *const c_char = ptr::null();
    let mut second: *const c_char = ptr::null();
    unsafe {
        assert_eq!((table.get_user_hash)(PLUGIN, host.connection, 42, &mut first), STATUS_OK);
        assert_eq!((table.get_user_hash)(PLUGIN, host.connection, 42, &mut second), STATUS_OK);
        assert_eq!(text(first), text(second));
        assert_ne!(first, second, "each call lends its own buffer");
        assert_eq!((table.free_memory)(PLUGIN, first.cast()), STATUS_OK);
        assert_eq!((table.free_memory)(PLUGIN, second.cast()), STATUS_OK);
    }
}

#[test]
fn unknown_plugin_wins_over_other_errors() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let mut name: *const c_char = ptr::null();
    let status = unsafe { (table.get_user_name)(99, host.connection + 5, 4242, &mut name) };
    assert_eq!(status, ErrorCode::InvalidPluginId.raw());
    assert!(name.is_null());
}

#[test]
fn null_out_param_still_checks_the_plugin_first() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let status = unsafe { (table.get_user_name)(99, host.connection, 42, ptr::null_mut()) };
    assert_eq!(status, ErrorCode::InvalidPluginId.raw());
    let status = unsafe { (table.get_user_name)(PLUGIN, host.connection, 42, ptr::null_mut()) };
    assert_eq!(status, ErrorCode::GenericError.raw());
}

#[test]
fn table_calls_from_a_host_task_do_not_time_out() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let connection = host.connection;

    let began = Instant::now();
    let (status, local) = host
        .executor
        .handle()
        .query(move |_| {
            let mut local: UserId = 0;
            let status =
                unsafe { (api_table_v1_2().get_local_user_id)(PLUGIN, connection, &mut local) };
            (status, local)
        })
        .unwrap();
    assert_eq!(status, STATUS_OK);
    assert_eq!(local, 1);
    assert!(began.elapsed() < Duration::from_millis(800));
}

#[test]
fn stale_connection_is_not_found() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let mut name: *const c_char = ptr::null();
    let status = unsafe { (table.get_user_name)(PLUGIN, host.connection + 1, 42, &mut name) };
    assert_eq!(status, ErrorCode::ConnectionNotFound.raw());
}

#[test]
fn double_setting_through_int_accessor() {
    let host = start(Session::None);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let mut value: i64 = 0;
    // Key 1 is the VAD silence threshold, a double.
    let status = unsafe { (table.get_setting_int)(PLUGIN, 1, &mut value) };
    assert_eq!(status, ErrorCode::WrongSettingsType.raw());

    let mut threshold = 0.0f64;
    assert_eq!(
        unsafe { (table.get_setting_double)(PLUGIN, 1, &mut threshold) },
        STATUS_OK
    );
    assert!((threshold - 0.80).abs() < 1e-6);
    assert_eq!(
        unsafe { (table.get_setting_double)(PLUGIN, 42, &mut threshold) },
        ErrorCode::UnknownSettingsKey.raw()
    );
}

#[test]
fn blocked_host_times_out_and_skips_the_late_call() {
    let host = start(Session::Synchronized);
    let installed = install(&host);
    let table = api_table_v1_2();

    let (started_tx, started_rx) = std::sync::mpsc::channel();
    host.executor
        .handle()
        .post(Box::new(move |_| {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(1200));
        }))
        .unwrap();
    started_rx.recv().unwrap();

    let began = Instant::now();
    let mut name: *const c_char = ptr::null();
    let status = unsafe { (table.get_user_name)(PLUGIN, host.connection, 42, &mut name) };
    assert_eq!(status, ErrorCode::ApiRequestTimeout.raw());
    assert!(began.elapsed() >= Duration::from_millis(800));
    assert!(name.is_null());

    // Runs after the blocker and the cancelled call.
    let outstanding = host.executor.handle().query(|state| state.curator.borrow().len()).unwrap();
    assert_eq!(outstanding, 0);
    drop(installed);
    assert!(host.executor.shutdown().is_empty());
}

#[test]
fn unfreed_buffers_are_reported_once_at_shutdown() {
    let host = start(Session::Synchronized);
    let installed = install(&host);
    let table = api_table_v1_2();

    let mut name: *const c_char = ptr::null();
    let mut users: *mut UserId = ptr::null_mut();
    let mut count = 0usize;
    unsafe {
        assert_eq!((table.get_user_name)(PLUGIN, host.connection, 42, &mut name), STATUS_OK);
        assert_eq!(
            (table.get_all_users)(PLUGIN, host.connection, &mut users, &mut count),
            STATUS_OK
        );
        assert_eq!(std::slice::from_raw_parts(users, count), &[1, 42]);
    }

    drop(installed);
    let mut leaks = host.executor.shutdown();
    leaks.sort_by_key(|leak| leak.call);
    assert_eq!(leaks.len(), 2);
    assert!(leaks.iter().all(|leak| leak.plugin == PLUGIN));
    assert_eq!(leaks[0].call, "get_all_users");
    assert_eq!(leaks[1].call, "get_user_name");
}

#[test]
fn play_sample_volume_depends_on_table_version() {
    let host = start(Session::None);
    let _abi = install(&host);
    let sample = tempfile::NamedTempFile::new().unwrap();
    let path = std::ffi::CString::new(sample.path().to_str().unwrap()).unwrap();

    unsafe {
        assert_eq!((api_table_v1_0().play_sample)(PLUGIN, path.as_ptr()), STATUS_OK);
        assert_eq!((api_table_v1_2().play_sample)(PLUGIN, path.as_ptr(), 0.25), STATUS_OK);
        assert_eq!(
            (api_table_v1_2().play_sample)(PLUGIN, c"/no/such/sample.ogg".as_ptr(), 1.0),
            ErrorCode::InvalidSample.raw()
        );
    }
    let volumes: Vec<f32> = host.audio.played().into_iter().map(|(_, v)| v).collect();
    assert_eq!(volumes, vec![1.0, 0.25]);
}

#[test]
fn send_data_reaches_the_server_link() {
    let host = start(Session::Synchronized);
    let _abi = install(&host);
    let table = api_table_v1_2();

    let receivers: [UserId; 1] = [42];
    let payload = b"ping";
    let status = unsafe {
        (table.send_data)(
            PLUGIN,
            host.connection,
            receivers.as_ptr(),
            receivers.len(),
            payload.as_ptr(),
            payload.len(),
            c"scout.ping".as_ptr(),
        )
    };
    assert_eq!(status, STATUS_OK);
    let sent = host.link.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data, b"ping");
    assert_eq!(sent[0].data_id, "scout.ping");
    assert_eq!(sent[0].receivers, vec![42]);
}

#[test]
fn calls_without_installed_host_are_internal_errors() {
    let _lock = ABI.lock();
    let mut connection: ConnectionHandle = 0;
    let status = unsafe { (api_table_v1_2().get_active_server_connection)(PLUGIN, &mut connection) };
    assert_eq!(status, ErrorCode::InternalError.raw());
}
