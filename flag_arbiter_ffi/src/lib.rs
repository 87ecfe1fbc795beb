#![allow(clippy::missing_safety_doc)]

use std::ffi::c_void;
use std::ptr;

use flag_arbiter_core::{FlagDocument, Params};
use flag_arbiter_supervisor::{
    Bulletin, BulletinAdapter, ControllerError, DispatchStats, FlagSupervisor, ResourceCall,
    ResourceController, RestoreStats, SupervisorCfg,
};
use tracing::warn;

/// FFI ABI version for flag_arbiter_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const FLAG_ARBITER_FFI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn fa_ffi_version() -> u32 {
    FLAG_ARBITER_FFI_VERSION
}

// Return codes shared by the `i32`-returning calls.
pub const FA_OK: i32 = 0;
pub const FA_ERR_NULL: i32 = -1;
pub const FA_ERR_UTF8: i32 = -2;
pub const FA_ERR_JSON: i32 = -3;
pub const FA_ERR_IO: i32 = -4;
pub const FA_ERR_NO_PATH: i32 = -5;
pub const FA_ERR_UNKNOWN_FLAG: i32 = -6;

/// Opaque handle exposed over FFI.
pub struct FaSupervisor {
    inner: FlagSupervisor,
    adapter: BulletinAdapter,
}

/// FFI string view (UTF-8 bytes, not NUL-terminated).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FaStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl FaStr {
    pub const EMPTY: FaStr = FaStr {
        ptr: ptr::null(),
        len: 0,
    };

    fn is_empty(&self) -> bool {
        self.ptr.is_null() || self.len == 0
    }

    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }

    fn borrowed(s: &str) -> FaStr {
        FaStr {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }
}

/// Owned byte buffer; release with `fa_bytes_free`.
#[repr(C)]
pub struct FaBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl FaBytes {
    fn null() -> Self {
        FaBytes {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vec(buf: Vec<u8>) -> Self {
        let mut boxed = buf.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        let len = boxed.len();
        std::mem::forget(boxed);
        FaBytes { ptr, len }
    }
}

/// Host-side resource. `call` gets the verb and its JSON arguments, both
/// valid only for the duration of the call, and returns 0 on success.
/// A null `call` makes every dispatch fail as unavailable.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FaController {
    pub user: *mut c_void,
    pub call: Option<extern "C" fn(user: *mut c_void, verb: FaStr, args_json: FaStr) -> i32>,
}

impl ResourceController for FaController {
    fn call(&mut self, call: &ResourceCall) -> Result<(), ControllerError> {
        let Some(f) = self.call else {
            return Err(ControllerError::Unavailable);
        };
        let verb = call.verb();
        let args = call.args().to_string();
        match f(self.user, FaStr::borrowed(verb), FaStr::borrowed(&args)) {
            0 => Ok(()),
            rc => Err(ControllerError::Failed {
                verb,
                message: format!("host returned {rc}"),
            }),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaTickResult {
    pub changes: u32,
    pub passes: u32,
    pub fired: u32,
    pub scheduled: u32,
    pub converged: u8,
    pub rc: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaDispatchStats {
    pub sent: u32,
    pub skipped: u32,
    pub failed: u32,
    pub rc: i32,
}

impl From<DispatchStats> for FaDispatchStats {
    fn from(s: DispatchStats) -> Self {
        FaDispatchStats {
            sent: s.sent as u32,
            skipped: s.skipped as u32,
            failed: s.failed as u32,
            rc: FA_OK,
        }
    }
}

/// Restore result statistics (FFI-safe).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaRestoreStats {
    pub applied: u32,
    pub overwritten: u32,
    pub skipped: u32,
    pub rc: i32,
}

impl FaRestoreStats {
    fn err(rc: i32) -> Self {
        FaRestoreStats {
            rc,
            ..Self::default()
        }
    }
}

impl From<RestoreStats> for FaRestoreStats {
    fn from(s: RestoreStats) -> Self {
        FaRestoreStats {
            applied: s.applied as u32,
            overwritten: s.overwritten as u32,
            skipped: s.skipped as u32,
            rc: FA_OK,
        }
    }
}

fn parse_payload(json: FaStr) -> Result<Params, i32> {
    if json.is_empty() {
        return Ok(Params::new());
    }
    let text = json.as_str().ok_or(FA_ERR_UTF8)?;
    serde_json::from_str::<Params>(text).map_err(|e| {
        warn!(error = %e, "fact payload rejected");
        FA_ERR_JSON
    })
}

/// Create a supervisor handle from settings JSON. An empty string means
/// defaults. Returns null if the settings do not parse.
///
/// The flag document named by `flags_path` is loaded here; a missing or bad
/// file yields an empty graph. No threads are spawned: the host drives
/// `fa_tick*` and `fa_reflect` on its own timers.
#[no_mangle]
pub extern "C" fn fa_supervisor_new(settings_json: FaStr) -> *mut FaSupervisor {
    let cfg = if settings_json.is_empty() {
        SupervisorCfg::default()
    } else {
        let Some(text) = settings_json.as_str() else {
            return ptr::null_mut();
        };
        match serde_json::from_str::<SupervisorCfg>(text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "settings rejected");
                return ptr::null_mut();
            }
        }
    };
    let handle = FaSupervisor {
        inner: FlagSupervisor::boot(cfg),
        adapter: BulletinAdapter::new(),
    };
    Box::into_raw(Box::new(handle))
}

#[no_mangle]
pub unsafe extern "C" fn fa_supervisor_free(h: *mut FaSupervisor) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Record a fact stamped with the current wall-clock time.
#[no_mangle]
pub unsafe extern "C" fn fa_trigger_event(h: *mut FaSupervisor, category: FaStr, payload_json: FaStr) -> i32 {
    if h.is_null() {
        return FA_ERR_NULL;
    }
    let Some(category) = category.as_str() else {
        return FA_ERR_UTF8;
    };
    match parse_payload(payload_json) {
        Ok(payload) => {
            (*h).inner.trigger_event(category, payload);
            FA_OK
        }
        Err(rc) => rc,
    }
}

#[no_mangle]
pub unsafe extern "C" fn fa_trigger_event_at(
    h: *mut FaSupervisor,
    category: FaStr,
    payload_json: FaStr,
    timestamp: f64,
) -> i32 {
    if h.is_null() {
        return FA_ERR_NULL;
    }
    let Some(category) = category.as_str() else {
        return FA_ERR_UTF8;
    };
    match parse_payload(payload_json) {
        Ok(payload) => {
            (*h).inner.trigger_event_at(category, payload, timestamp);
            FA_OK
        }
        Err(rc) => rc,
    }
}

/// Feed one bulletin (`{"kind": "eew" | "report" | "tsunami", ...}`) through
/// the handle's adapter. Returns the number of facts recorded, or a negative
/// error code.
#[no_mangle]
pub unsafe extern "C" fn fa_ingest_bulletin(h: *mut FaSupervisor, bulletin_json: FaStr) -> i32 {
    if h.is_null() {
        return FA_ERR_NULL;
    }
    let Some(text) = bulletin_json.as_str() else {
        return FA_ERR_UTF8;
    };
    let bulletin = match serde_json::from_str::<Bulletin>(text) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "bulletin rejected");
            return FA_ERR_JSON;
        }
    };
    let handle = &mut *h;
    handle.inner.ingest(&mut handle.adapter, std::slice::from_ref(&bulletin)) as i32
}

unsafe fn tick_with(h: *mut FaSupervisor, now: Option<f64>) -> FaTickResult {
    if h.is_null() {
        return FaTickResult {
            rc: FA_ERR_NULL,
            ..FaTickResult::default()
        };
    }
    let sup = &(*h).inner;
    let report = match now {
        Some(now) => sup.tick_at(now),
        None => sup.tick(),
    };
    FaTickResult {
        changes: report.changes.len() as u32,
        passes: report.passes as u32,
        fired: report.fired as u32,
        scheduled: report.scheduled as u32,
        converged: report.converged as u8,
        rc: FA_OK,
    }
}

#[no_mangle]
pub unsafe extern "C" fn fa_tick(h: *mut FaSupervisor) -> FaTickResult {
    tick_with(h, None)
}

#[no_mangle]
pub unsafe extern "C" fn fa_tick_at(h: *mut FaSupervisor, now: f64) -> FaTickResult {
    tick_with(h, Some(now))
}

/// Reflect the current flag state through the host's controller callback.
#[no_mangle]
pub unsafe extern "C" fn fa_reflect(h: *mut FaSupervisor, controller: FaController) -> FaDispatchStats {
    if h.is_null() {
        return FaDispatchStats {
            rc: FA_ERR_NULL,
            ..FaDispatchStats::default()
        };
    }
    let mut controller = controller;
    (*h).inner.reflect(&mut controller).into()
}

/// 1 = on, 0 = off, negative = unknown flag or bad arguments.
#[no_mangle]
pub unsafe extern "C" fn fa_flag_state(h: *mut FaSupervisor, flag_id: FaStr) -> i32 {
    if h.is_null() {
        return FA_ERR_NULL;
    }
    let Some(id) = flag_id.as_str() else {
        return FA_ERR_UTF8;
    };
    match (*h).inner.flag_state(id) {
        Some(true) => 1,
        Some(false) => 0,
        None => FA_ERR_UNKNOWN_FLAG,
    }
}

/// Current winner id as UTF-8 bytes; empty (null) when no upper flag is active.
#[no_mangle]
pub unsafe extern "C" fn fa_winner(h: *mut FaSupervisor) -> FaBytes {
    if h.is_null() {
        return FaBytes::null();
    }
    match (*h).inner.winner() {
        Some(id) => FaBytes::from_vec(id.into_bytes()),
        None => FaBytes::null(),
    }
}

/// `{"flag_id": bool, ...}` for every flag.
#[no_mangle]
pub unsafe extern "C" fn fa_snapshot_json(h: *mut FaSupervisor) -> FaBytes {
    if h.is_null() {
        return FaBytes::null();
    }
    match serde_json::to_vec(&(*h).inner.flag_snapshot()) {
        Ok(buf) => FaBytes::from_vec(buf),
        Err(e) => {
            warn!(error = %e, "snapshot serialization failed");
            FaBytes::null()
        }
    }
}

/// The full flag document, in the same format `fa_save` writes.
#[no_mangle]
pub unsafe extern "C" fn fa_document_json(h: *mut FaSupervisor) -> FaBytes {
    if h.is_null() {
        return FaBytes::null();
    }
    match (*h).inner.document().to_json_pretty() {
        Ok(text) => FaBytes::from_vec(text.into_bytes()),
        Err(e) => {
            warn!(error = %e, "document serialization failed");
            FaBytes::null()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn fa_bytes_free(b: FaBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}

/// Load a flag document. `merge != 0` keeps flags the document does not
/// mention; otherwise the graph is replaced.
#[no_mangle]
pub unsafe extern "C" fn fa_restore_document(
    h: *mut FaSupervisor,
    bytes: *const u8,
    len: usize,
    merge: u8,
) -> FaRestoreStats {
    if h.is_null() || bytes.is_null() {
        return FaRestoreStats::err(FA_ERR_NULL);
    }
    let data = std::slice::from_raw_parts(bytes, len);
    let Ok(text) = std::str::from_utf8(data) else {
        return FaRestoreStats::err(FA_ERR_UTF8);
    };
    let doc = match FlagDocument::from_json(text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "flag document rejected");
            return FaRestoreStats::err(FA_ERR_JSON);
        }
    };
    let sup = &(*h).inner;
    let stats = if merge != 0 {
        sup.restore_merge(doc)
    } else {
        sup.restore(doc)
    };
    stats.into()
}

/// Write the document to `path`, or to the settings' `flags_path` when
/// `path` is empty.
#[no_mangle]
pub unsafe extern "C" fn fa_save(h: *mut FaSupervisor, path: FaStr) -> i32 {
    if h.is_null() {
        return FA_ERR_NULL;
    }
    let sup = &(*h).inner;
    let res = if path.is_empty() {
        sup.save()
    } else {
        match path.as_str() {
            Some(p) => sup.save_to(p),
            None => return FA_ERR_UTF8,
        }
    };
    match res {
        Ok(()) => FA_OK,
        Err(flag_arbiter_supervisor::SupervisorError::NoDocumentPath) => FA_ERR_NO_PATH,
        Err(e) => {
            warn!(error = %e, "flag document save failed");
            FA_ERR_IO
        }
    }
}
