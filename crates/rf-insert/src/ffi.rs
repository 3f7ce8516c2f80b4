//! C ABI for the insert engine
//!
//! One global engine. Control functions serialize on `CONTROL`; the audio
//! callback only ever `try_lock`s `RENDER`, which the control functions never
//! take outside init/shutdown.
//!
//! Every function returns a [`StatusCode`] (0 = OK, negative = error) unless
//! noted otherwise.

use std::ffi::{CStr, CString, c_char};

use parking_lot::Mutex;
use rf_core::SampleRate;

use crate::config::EngineConfig;
use crate::engine::InsertEngine;
use crate::error::{InsertError, STATUS_OK, StatusCode, status_of};
use crate::params::ParamManifest;
use crate::preset::ChainPreset;
use crate::renderer::InsertRenderer;

static CONTROL: Mutex<Option<InsertEngine>> = parking_lot::const_mutex(None);
static RENDER: Mutex<Option<InsertRenderer>> = parking_lot::const_mutex(None);

/// Wrap FFI function body with panic guard
/// Returns default value if panic occurs (prevents UB from unwinding into C)
macro_rules! ffi_panic_guard {
    ($default:expr, $body:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(result) => result,
            Err(e) => {
                if let Some(s) = e.downcast_ref::<&str>() {
                    log::error!("[Insert] FFI panic caught: {}", s);
                } else if let Some(s) = e.downcast_ref::<String>() {
                    log::error!("[Insert] FFI panic caught: {}", s);
                } else {
                    log::error!("[Insert] FFI panic caught (unknown type)");
                }
                $default
            }
        }
    };
}

fn with_engine<T>(
    f: impl FnOnce(&mut InsertEngine) -> Result<T, InsertError>,
) -> Result<T, InsertError> {
    let mut guard = CONTROL.lock();
    let engine = guard.as_mut().ok_or(InsertError::NotInitialized)?;
    f(engine)
}

/// Borrow a NUL-terminated UTF-8 string
///
/// # Safety
/// `ptr` must be null or point to a valid C string that outlives the borrow.
unsafe fn cstr<'a>(ptr: *const c_char) -> Result<&'a str, InsertError> {
    if ptr.is_null() {
        return Err(InsertError::InvalidArgument("null string".into()));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| InsertError::InvalidArgument(e.to_string()))
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

/// Create (or re-create) the global engine
#[unsafe(no_mangle)]
pub extern "C" fn rf_insert_init(sample_rate: u32, max_tracks: u32) -> StatusCode {
    ffi_panic_guard!(InsertError::InvalidArgument(String::new()).status_code(), {
        let result = SampleRate::from_u32(sample_rate)
            .map_err(|e| InsertError::InvalidArgument(e.to_string()))
            .and_then(|rate| {
                let config = EngineConfig {
                    max_tracks: max_tracks as usize,
                    ..EngineConfig::default().with_sample_rate(rate)
                };
                InsertEngine::new(config)
            });
        match result {
            Ok((engine, renderer)) => {
                // Renderer first, so a callback never sees the new renderer
                // paired with the old engine's queues
                let old_renderer = RENDER.lock().replace(renderer);
                let old_engine = CONTROL.lock().replace(engine);
                drop(old_renderer);
                drop(old_engine);
                STATUS_OK
            }
            Err(e) => {
                log::warn!("[Insert] init failed: {e}");
                e.status_code()
            }
        }
    })
}

/// Tear down the global engine
#[unsafe(no_mangle)]
pub extern "C" fn rf_insert_shutdown() -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        let renderer = RENDER.lock().take();
        let engine = CONTROL.lock().take();
        match (renderer, engine) {
            (None, None) => InsertError::NotInitialized.status_code(),
            _ => {
                log::info!("[Insert] engine shut down");
                STATUS_OK
            }
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// TRACKS
// ═══════════════════════════════════════════════════════════════════════════

#[unsafe(no_mangle)]
pub extern "C" fn insert_create_track(track_id: u32) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| e.create_track(track_id)))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn insert_destroy_track(track_id: u32) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| e.destroy_track(track_id)))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// SLOT COMMANDS
// ═══════════════════════════════════════════════════════════════════════════

/// Load a processor by type id (canonical or alias)
///
/// # Safety
/// `processor_type` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_load_processor(
    track_id: u32,
    slot: u32,
    processor_type: *const c_char,
) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        let result = unsafe { cstr(processor_type) }
            .and_then(|name| with_engine(|e| e.load_processor(track_id, slot as usize, name)));
        status_of(&result)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn insert_set_param(track_id: u32, slot: u32, param: u32, value: f64) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| {
            e.set_param(track_id, slot as usize, param as usize, value)
        }))
    })
}

/// Read a parameter into `out_value`
///
/// # Safety
/// `out_value` must be null or valid for a write of one `f64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_get_param(
    track_id: u32,
    slot: u32,
    param: u32,
    out_value: *mut f64,
) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        if out_value.is_null() {
            return InsertError::InvalidArgument("null out pointer".into()).status_code();
        }
        match with_engine(|e| e.get_param(track_id, slot as usize, param as usize)) {
            Ok(value) => {
                unsafe { *out_value = value };
                STATUS_OK
            }
            Err(e) => e.status_code(),
        }
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn insert_set_bypass(track_id: u32, slot: u32, bypassed: i32) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| {
            e.set_bypass(track_id, slot as usize, bypassed != 0)
        }))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn insert_set_mix(track_id: u32, slot: u32, mix: f64) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| e.set_mix(track_id, slot as usize, mix)))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn insert_remove_processor(track_id: u32, slot: u32) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        status_of(&with_engine(|e| e.remove_processor(track_id, slot as usize)))
    })
}

/// Write the loaded type's canonical id into `buf` (empty string if none)
///
/// # Safety
/// `buf` must be null or valid for writes of `buf_len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_get_loaded_type(
    track_id: u32,
    slot: u32,
    buf: *mut c_char,
    buf_len: usize,
) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        if buf.is_null() || buf_len == 0 {
            return InsertError::InvalidArgument("null buffer".into()).status_code();
        }
        let id = match with_engine(|e| e.loaded_type(track_id, slot as usize)) {
            Ok(kind) => kind.map_or("", |k| k.id()),
            Err(e) => return e.status_code(),
        };
        if id.len() + 1 > buf_len {
            return InsertError::InvalidArgument(format!("buffer too small for {id}"))
                .status_code();
        }
        unsafe {
            std::ptr::copy_nonoverlapping(id.as_ptr().cast::<c_char>(), buf, id.len());
            *buf.add(id.len()) = 0;
        }
        STATUS_OK
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// PRESETS & MANIFEST
// ═══════════════════════════════════════════════════════════════════════════

/// Export a track's chain as JSON
///
/// Returns null on error. Free with [`insert_free_string`].
#[unsafe(no_mangle)]
pub extern "C" fn insert_export_chain_json(track_id: u32) -> *mut c_char {
    ffi_panic_guard!(std::ptr::null_mut(), {
        let json = with_engine(|e| e.export_chain(track_id)).and_then(|preset| {
            preset
                .to_json()
                .map_err(|e| InsertError::InvalidPreset(e.to_string()))
        });
        match json {
            Ok(json) => into_c_string(json),
            Err(e) => {
                log::warn!("[Insert] export failed for track {track_id}: {e}");
                std::ptr::null_mut()
            }
        }
    })
}

/// Replace a track's chain from preset JSON
///
/// # Safety
/// `json` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_import_chain_json(track_id: u32, json: *const c_char) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        let result = unsafe { cstr(json) }
            .and_then(ChainPreset::from_json)
            .and_then(|preset| with_engine(|e| e.import_chain(track_id, &preset)));
        status_of(&result)
    })
}

/// Parameter manifest JSON (works without an engine). Free with [`insert_free_string`].
#[unsafe(no_mangle)]
pub extern "C" fn insert_param_manifest_json() -> *mut c_char {
    ffi_panic_guard!(std::ptr::null_mut(), {
        match ParamManifest::current().to_json() {
            Ok(json) => into_c_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    })
}

/// Free a string returned by this library
///
/// # Safety
/// `ptr` must be null or a pointer obtained from this library, freed once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            drop(CString::from_raw(ptr));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AUDIO THREAD
// ═══════════════════════════════════════════════════════════════════════════

/// Run a track's chain over `frames` stereo samples in place (audio thread)
///
/// Never blocks: while the engine is being (re)initialized this returns
/// `NotInitialized` and leaves the audio untouched.
///
/// # Safety
/// `left` and `right` must be null or valid for reads and writes of `frames`
/// samples each, and must not alias.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn insert_render_track(
    track_id: u32,
    left: *mut f64,
    right: *mut f64,
    frames: usize,
) -> StatusCode {
    ffi_panic_guard!(InsertError::NotInitialized.status_code(), {
        if left.is_null() || right.is_null() {
            return InsertError::InvalidArgument(String::new()).status_code();
        }
        let Some(mut guard) = RENDER.try_lock() else {
            return InsertError::NotInitialized.status_code();
        };
        let Some(renderer) = guard.as_mut() else {
            return InsertError::NotInitialized.status_code();
        };
        let (left, right) = unsafe {
            (
                std::slice::from_raw_parts_mut(left, frames),
                std::slice::from_raw_parts_mut(right, frames),
            )
        };
        if renderer.process_track(track_id, left, right) {
            STATUS_OK
        } else {
            InsertError::InvalidTrack(track_id).status_code()
        }
    })
}
