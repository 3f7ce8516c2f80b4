//! C ABI tests. The engine behind the ABI is a process global, so every
//! test runs serially and starts from a fresh init.

use std::ffi::{CStr, CString, c_char};

use rf_insert::ffi::*;
use rf_insert::{ChainPreset, ParamManifest};
use serial_test::serial;

fn init() {
    assert_eq!(rf_insert_init(48000, 8), 0);
    assert_eq!(insert_create_track(1), 0);
}

fn loaded_type(track: u32, slot: u32) -> Result<String, i32> {
    let mut buf = [0 as c_char; 64];
    let code = unsafe { insert_get_loaded_type(track, slot, buf.as_mut_ptr(), buf.len()) };
    if code != 0 {
        return Err(code);
    }
    let id = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(id.to_string_lossy().into_owned())
}

#[test]
#[serial]
fn test_not_initialized() {
    rf_insert_shutdown();
    assert_eq!(insert_create_track(1), -11);
    assert_eq!(insert_set_param(1, 0, 0, 0.0), -11);
    assert_eq!(rf_insert_shutdown(), -11);
    assert!(insert_export_chain_json(1).is_null());
}

#[test]
#[serial]
fn test_invalid_init() {
    rf_insert_shutdown();
    assert_eq!(rf_insert_init(12345, 8), -12);
    assert_eq!(rf_insert_init(48000, 0), -12);
    assert_eq!(rf_insert_init(48000, u32::MAX), -12);
    assert_eq!(insert_create_track(1), -11);
    rf_insert_shutdown();
}

#[test]
#[serial]
fn test_load_set_get_through_abi() {
    init();
    let name = CString::new("ProEQ").unwrap();
    assert_eq!(unsafe { insert_load_processor(1, 2, name.as_ptr()) }, 0);
    assert_eq!(loaded_type(1, 2).as_deref(), Ok("pro-eq"));
    assert_eq!(loaded_type(1, 3).as_deref(), Ok(""));

    assert_eq!(insert_set_param(1, 2, 2 * 11, 1000.0), 0);
    let mut value = 0.0;
    assert_eq!(unsafe { insert_get_param(1, 2, 2 * 11, &mut value) }, 0);
    assert_eq!(value, 1000.0);

    assert_eq!(insert_set_param(1, 2, 705, 1.0), -4);
    assert_eq!(insert_set_param(1, 4, 0, 1.0), -5);
    assert_eq!(insert_set_param(9, 2, 0, 1.0), -1);
    assert_eq!(insert_set_param(1, 8, 0, 1.0), -2);
    assert_eq!(unsafe { insert_get_param(1, 2, 0, std::ptr::null_mut()) }, -12);

    let unknown = CString::new("spring-reverb").unwrap();
    assert_eq!(unsafe { insert_load_processor(1, 0, unknown.as_ptr()) }, -3);
    assert_eq!(unsafe { insert_load_processor(1, 0, std::ptr::null()) }, -12);

    assert_eq!(insert_set_bypass(1, 5, 1), 0);
    assert_eq!(insert_set_mix(1, 2, 0.5), 0);
    assert_eq!(insert_remove_processor(1, 2), 0);
    assert_eq!(insert_remove_processor(1, 2), -5);
    assert_eq!(loaded_type(1, 2).as_deref(), Ok(""));

    rf_insert_shutdown();
}

#[test]
#[serial]
fn test_loaded_type_buffer_too_small() {
    init();
    let name = CString::new("algorithmic-reverb").unwrap();
    assert_eq!(unsafe { insert_load_processor(1, 0, name.as_ptr()) }, 0);
    let mut buf = [0 as c_char; 8];
    assert_eq!(
        unsafe { insert_get_loaded_type(1, 0, buf.as_mut_ptr(), buf.len()) },
        -12
    );
    rf_insert_shutdown();
}

#[test]
#[serial]
fn test_render_track_through_abi() {
    init();
    let name = CString::new("saturator").unwrap();
    assert_eq!(unsafe { insert_load_processor(1, 0, name.as_ptr()) }, 0);
    // Hard clip at 0 dB output
    assert_eq!(insert_set_param(1, 0, 1, 4.0), 0);
    assert_eq!(insert_set_param(1, 0, 0, 20.0), 0);

    let mut left = vec![0.5; 256];
    let mut right = vec![-0.5; 256];
    for _ in 0..4 {
        left.fill(0.5);
        right.fill(-0.5);
        let code = unsafe {
            insert_render_track(1, left.as_mut_ptr(), right.as_mut_ptr(), left.len())
        };
        assert_eq!(code, 0);
    }
    assert!(left.iter().all(|&s| (s - 1.0).abs() < 1e-9));
    assert!(right.iter().all(|&s| (s + 1.0).abs() < 1e-9));

    let code = unsafe { insert_render_track(2, left.as_mut_ptr(), right.as_mut_ptr(), 256) };
    assert_eq!(code, -1);
    rf_insert_shutdown();
}

#[test]
#[serial]
fn test_chain_json_round_trip() {
    init();
    let name = CString::new("comp").unwrap();
    assert_eq!(unsafe { insert_load_processor(1, 1, name.as_ptr()) }, 0);
    assert_eq!(insert_set_param(1, 1, 0, -18.0), 0);
    assert_eq!(insert_set_bypass(1, 1, 1), 0);

    let ptr = insert_export_chain_json(1);
    assert!(!ptr.is_null());
    let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
    unsafe { insert_free_string(ptr) };

    let preset = ChainPreset::from_json(&json).unwrap();
    assert_eq!(preset.slots[0].processor, "compressor");
    assert!(preset.slots[0].bypassed);

    assert_eq!(insert_create_track(2), 0);
    let json = CString::new(json).unwrap();
    assert_eq!(unsafe { insert_import_chain_json(2, json.as_ptr()) }, 0);
    let mut value = 0.0;
    assert_eq!(unsafe { insert_get_param(2, 1, 0, &mut value) }, 0);
    assert_eq!(value, -18.0);

    let garbage = CString::new("{ \"version\": 1, \"slots\": 3 }").unwrap();
    assert_eq!(unsafe { insert_import_chain_json(2, garbage.as_ptr()) }, -10);
    rf_insert_shutdown();
}

#[test]
#[serial]
fn test_manifest_json() {
    let ptr = insert_param_manifest_json();
    assert!(!ptr.is_null());
    let json = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
    unsafe { insert_free_string(ptr) };

    let expected = ParamManifest::current().to_json().unwrap();
    assert_eq!(json, expected);
    assert!(json.contains("\"pro-eq\""));
}
