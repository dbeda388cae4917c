//! Runtime-bound SimConnect client library

use std::ffi::{CString, OsStr, c_void};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{debug, trace, warn};
use windows::Win32::Foundation::{
    CloseHandle, E_FAIL, FreeLibrary, HANDLE, HMODULE, HWND, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::Win32::System::Threading::{CreateEventW, SetEvent, WaitForSingleObject};
use windows::core::{HRESULT, PCSTR, PCWSTR};

use crate::config::ClientConfig;
use crate::host::{Host, HostSession, Notifier, OpenParams, SimObjectType};
use crate::schema::FieldDefinition;
use crate::types::{DataDefinitionId, RequestId};
use crate::{Result, SimError};

/// Library loaded when no explicit path is configured.
pub const SIMCONNECT_DLL: &str = "SimConnect.dll";

/// `SIMCONNECT_UNUSED`: "no datum id" for `AddToDataDefinition`.
const SIMCONNECT_UNUSED: u32 = u32::MAX;

/// Upper bound on how long the waiter thread sleeps before re-checking its
/// stop flag.
const WAIT_SLICE_MS: u32 = 250;

type OpenFn = unsafe extern "system" fn(*mut HANDLE, PCSTR, HWND, u32, HANDLE, u32) -> HRESULT;
type CloseFn = unsafe extern "system" fn(HANDLE) -> HRESULT;
type AddToDataDefinitionFn =
    unsafe extern "system" fn(HANDLE, u32, PCSTR, PCSTR, u32, f32, u32) -> HRESULT;
type RequestDataOnSimObjectTypeFn =
    unsafe extern "system" fn(HANDLE, u32, u32, u32, u32) -> HRESULT;
type GetNextDispatchFn = unsafe extern "system" fn(HANDLE, *mut *mut u8, *mut u32) -> HRESULT;

/// Entry points resolved from the loaded library.
struct Library {
    module: HMODULE,
    open: OpenFn,
    close: CloseFn,
    add_to_data_definition: AddToDataDefinitionFn,
    request_data_on_sim_object_type: RequestDataOnSimObjectTypeFn,
    get_next_dispatch: GetNextDispatchFn,
}

impl Library {
    fn load(path: Option<&Path>) -> Result<Self> {
        let name = path.map(Path::as_os_str).unwrap_or_else(|| OsStr::new(SIMCONNECT_DLL));
        let wide_name = wide_string(name);

        let module = unsafe { LoadLibraryW(PCWSTR::from_raw(wide_name.as_ptr())) }.map_err(|e| {
            SimError::windows_api_error(format!("LoadLibraryW({})", name.to_string_lossy()), e)
        })?;

        match unsafe { Self::resolve(module) } {
            Ok(library) => {
                debug!(library = %name.to_string_lossy(), "Loaded SimConnect library");
                Ok(library)
            }
            Err(e) => {
                unsafe {
                    let _ = FreeLibrary(module);
                }
                Err(e)
            }
        }
    }

    /// # Safety
    ///
    /// `module` must be a loaded SimConnect library whose exports have the
    /// signatures declared above.
    unsafe fn resolve(module: HMODULE) -> Result<Self> {
        macro_rules! symbol {
            ($name:literal, $ty:ty) => {{
                let proc = unsafe { GetProcAddress(module, PCSTR::from_raw(concat!($name, "\0").as_ptr())) }
                    .ok_or_else(|| {
                        SimError::connection_failed(concat!("SimConnect library does not export ", $name))
                    })?;
                // SAFETY: the export matches the SimConnect SDK declaration of `$name`
                unsafe { std::mem::transmute::<unsafe extern "system" fn() -> isize, $ty>(proc) }
            }};
        }

        Ok(Self {
            module,
            open: symbol!("SimConnect_Open", OpenFn),
            close: symbol!("SimConnect_Close", CloseFn),
            add_to_data_definition: symbol!("SimConnect_AddToDataDefinition", AddToDataDefinitionFn),
            request_data_on_sim_object_type: symbol!(
                "SimConnect_RequestDataOnSimObjectType",
                RequestDataOnSimObjectTypeFn
            ),
            get_next_dispatch: symbol!("SimConnect_GetNextDispatch", GetNextDispatchFn),
        })
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            let _ = FreeLibrary(self.module);
        }
    }
}

// SAFETY: the module handle and function pointers are process-global and
// immutable once resolved
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

/// [`Host`] backed by the SimConnect client library.
#[derive(Clone)]
pub struct SimConnectHost {
    library: Arc<Library>,
}

impl SimConnectHost {
    /// Load `SimConnect.dll`, or `config.library_path` when set.
    pub fn load(config: &ClientConfig) -> Result<Self> {
        let library = Library::load(config.library_path.as_deref())?;
        Ok(Self { library: Arc::new(library) })
    }
}

impl std::fmt::Debug for SimConnectHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimConnectHost").field("module", &self.library.module.0).finish()
    }
}

impl Host for SimConnectHost {
    type Session = SimConnectSession;

    fn open(&mut self, params: &OpenParams) -> Result<SimConnectSession> {
        let app_name = CString::new(params.app_name.as_str())
            .map_err(|_| SimError::config_error("app_name must not contain NUL bytes"))?;

        let event = unsafe { CreateEventW(None, false, false, PCWSTR::null()) }
            .map_err(|e| SimError::windows_api_error("CreateEventW", e))?;

        let mut handle = HANDLE::default();
        let hr = unsafe {
            (self.library.open)(
                &mut handle,
                PCSTR::from_raw(app_name.as_ptr().cast()),
                HWND::default(),
                params.notify_tag,
                event,
                params.config_index,
            )
        };
        if let Err(e) = hr.ok() {
            unsafe {
                let _ = CloseHandle(event);
            }
            return Err(SimError::connection_failed_with_source(
                "SimConnect_Open failed, is the simulator running?",
                Box::new(e),
            ));
        }

        let waiter = match EventWaiter::spawn(event, params.notifier.clone()) {
            Ok(waiter) => waiter,
            Err(e) => {
                unsafe {
                    let _ = (self.library.close)(handle);
                    let _ = CloseHandle(event);
                }
                return Err(e);
            }
        };

        debug!(app_name = %params.app_name, "SimConnect session opened");
        Ok(SimConnectSession {
            library: Arc::clone(&self.library),
            handle,
            event,
            waiter,
            closed: false,
        })
    }
}

/// One open SimConnect connection.
pub struct SimConnectSession {
    library: Arc<Library>,
    handle: HANDLE,
    event: HANDLE,
    waiter: EventWaiter,
    closed: bool,
}

impl SimConnectSession {
    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.waiter.stop(self.event);
        let hr = unsafe { (self.library.close)(self.handle) };
        unsafe {
            let _ = CloseHandle(self.event);
        }
        debug!("SimConnect session closed");
        hr.ok().map_err(|e| SimError::windows_api_error("SimConnect_Close", e))
    }
}

impl HostSession for SimConnectSession {
    fn add_to_data_definition(
        &mut self,
        definition: DataDefinitionId,
        field: &FieldDefinition,
    ) -> Result<()> {
        let name = CString::new(field.name).map_err(|_| {
            SimError::config_error(format!("field name {:?} contains a NUL byte", field.name))
        })?;
        let unit = field
            .unit
            .map(CString::new)
            .transpose()
            .map_err(|_| SimError::config_error(format!("unit of {:?} contains a NUL byte", field.name)))?;
        let unit_ptr = unit.as_ref().map_or(PCSTR::null(), |u| PCSTR::from_raw(u.as_ptr().cast()));

        let hr = unsafe {
            (self.library.add_to_data_definition)(
                self.handle,
                definition.0,
                PCSTR::from_raw(name.as_ptr().cast()),
                unit_ptr,
                field.data_type.wire_code(),
                0.0,
                SIMCONNECT_UNUSED,
            )
        };
        hr.ok().map_err(|e| {
            SimError::connection_failed_with_source(
                format!("SimConnect_AddToDataDefinition rejected '{}'", field.name),
                Box::new(e),
            )
        })
    }

    fn request_data_on_sim_object_type(
        &mut self,
        request: RequestId,
        definition: DataDefinitionId,
        radius_meters: u32,
        object_type: SimObjectType,
    ) -> Result<()> {
        let hr = unsafe {
            (self.library.request_data_on_sim_object_type)(
                self.handle,
                request.0,
                definition.0,
                radius_meters,
                object_type.wire_code(),
            )
        };
        hr.ok().map_err(|e| {
            SimError::request_failed_with_source("SimConnect_RequestDataOnSimObjectType failed", Box::new(e))
        })
    }

    fn receive_next(&mut self) -> Result<Option<Vec<u8>>> {
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut size = 0u32;
        let hr = unsafe { (self.library.get_next_dispatch)(self.handle, &mut data, &mut size) };

        if !dispatch_pending(hr)? || data.is_null() || size == 0 {
            return Ok(None);
        }

        // SAFETY: SimConnect keeps the buffer valid until the next dispatch call
        let message = unsafe { std::slice::from_raw_parts(data, size as usize) }.to_vec();
        trace!(len = message.len(), "Received SimConnect message");
        Ok(Some(message))
    }

    fn close(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl Drop for SimConnectSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Error closing SimConnect session on drop");
        }
    }
}

// SAFETY: the session handle is only used by the thread that owns the
// session; the event handle is a kernel object
unsafe impl Send for SimConnectSession {}

/// Classify a `SimConnect_GetNextDispatch` result.
///
/// `Ok(true)` when a message was returned and `Ok(false)` when the queue is
/// empty (`E_FAIL`). Any other failure means the pipe to the simulator broke.
fn dispatch_pending(hr: HRESULT) -> Result<bool> {
    if hr.is_ok() {
        return Ok(true);
    }
    if hr == E_FAIL {
        return Ok(false);
    }
    Err(SimError::receive_failed_with_source(
        "SimConnect_GetNextDispatch",
        Box::new(windows::core::Error::from_hresult(hr)),
    ))
}

/// Background thread forwarding event signals to a [`Notifier`].
struct EventWaiter {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventWaiter {
    fn spawn(event: HANDLE, notifier: Notifier) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        // HANDLE is not Send; move the raw value across
        let event_raw = event.0 as usize;

        let thread = std::thread::Builder::new()
            .name("simconnect-events".into())
            .spawn(move || {
                let event = HANDLE(event_raw as *mut c_void);
                while !stop_flag.load(Ordering::Acquire) {
                    // SAFETY: the session closes the event only after joining this thread
                    match unsafe { WaitForSingleObject(event, WAIT_SLICE_MS) } {
                        WAIT_OBJECT_0 => {
                            if stop_flag.load(Ordering::Acquire) {
                                break;
                            }
                            if !notifier.notify() {
                                trace!("Notification queue closed, stopping event waiter");
                                break;
                            }
                        }
                        WAIT_TIMEOUT => {}
                        other => {
                            let win_err = windows::core::Error::from_thread();
                            warn!(result = other.0, error = %win_err, "Waiting on SimConnect event failed");
                            break;
                        }
                    }
                }
            })
            .map_err(|e| {
                SimError::connection_failed_with_source("failed to start event waiter thread", Box::new(e))
            })?;

        Ok(Self { stop, thread: Some(thread) })
    }

    fn stop(&mut self, event: HANDLE) {
        self.stop.store(true, Ordering::Release);
        unsafe {
            let _ = SetEvent(event);
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Event waiter thread panicked");
        }
    }
}

/// Convert an OS string to a null-terminated wide string for Windows APIs
fn wide_string(s: &OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    s.encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use crate::host::DEFAULT_NOTIFY_TAG;
    use crate::schema::DataDefinition;
    use crate::types::TELEMETRY_REQUEST;
    use std::time::Duration;

    #[test]
    fn wide_string_is_nul_terminated() {
        let wide = wide_string(OsStr::new("SimConnect.dll"));
        assert_eq!(wide.len(), SIMCONNECT_DLL.len() + 1);
        assert_eq!(wide.last(), Some(&0));
    }

    #[test]
    fn empty_queue_is_not_an_error() {
        assert!(dispatch_pending(HRESULT(0)).unwrap());
        assert!(!dispatch_pending(E_FAIL).unwrap());
    }

    #[test]
    fn broken_pipe_while_draining_is_a_receive_error() {
        // STATUS_PIPE_BROKEN, raised when the simulator dies without a quit message
        let err = dispatch_pending(HRESULT(0xC000_014B_u32 as i32)).unwrap_err();
        assert!(matches!(err, SimError::Receive { .. }));
        assert!(err.closes_session());
    }

    #[test]
    fn missing_library_fails_to_load() {
        let config = ClientConfig {
            library_path: Some("definitely-not-here\\SimConnect.dll".into()),
            ..ClientConfig::default()
        };
        let err = SimConnectHost::load(&config).err().unwrap();
        assert!(matches!(err, SimError::WindowsApi { .. }));
    }

    #[test]
    #[ignore = "simulator_required"]
    fn live_session_opens_and_polls() {
        let mut host = SimConnectHost::load(&ClientConfig::default()).expect("SimConnect.dll");
        let (notifier, mut queue) = Notifier::channel(DEFAULT_NOTIFY_TAG);
        let params = OpenParams {
            app_name: "simwatch live test".into(),
            notify_tag: DEFAULT_NOTIFY_TAG,
            config_index: 0,
            notifier,
        };

        let mut session = host.open(&params).expect("simulator running");
        let definition = DataDefinition::telemetry();
        crate::schema::define_schema(&mut session, &definition).expect("definition registered");
        session
            .request_data_on_sim_object_type(TELEMETRY_REQUEST, definition.id(), 0, SimObjectType::User)
            .expect("request sent");

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut received = 0;
        while std::time::Instant::now() < deadline {
            if queue.try_recv().is_ok() {
                while session.receive_next().expect("dispatch").is_some() {
                    received += 1;
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(received > 0, "expected at least the open acknowledgement");
        session.close().expect("closed");
    }
}
