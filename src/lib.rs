//! # LifeLink Core
//!
//! Local data and auth emulator for the LifeLink blood donor network. It
//! stands in for a hosted backend-as-a-service so the application runs with
//! no backend configured: a table API (`select`/`eq`/`insert`/`update`/
//! `delete`/`limit`/`single`), a session emulation with auth state listeners,
//! and a realtime channel stub, all kept in a key-value store.
//!
//! ## Storage
//!
//! - [`storage::MemoryStore`]: process memory, for tests and throwaway runs
//! - [`local_db_state::AppDbState`]: LMDB, survives restarts
//!
//! Both sit behind [`storage::KeyValueStore`]; [`client::LocalClient`] is
//! generic over it.
//!
//! ## Quick Start
//!
//! ```rust
//! use lifelink_core::auth::SignUpRequest;
//! use lifelink_core::client::MemoryClient;
//! use lifelink_core::local_db_model::Row;
//!
//! let client = MemoryClient::in_memory();
//! let signed_up = client
//!     .auth()
//!     .sign_up(SignUpRequest::new("alex@example.com", "secret").full_name("Alex"))?;
//!
//! client
//!     .from("donor_profiles")
//!     .insert(Row::new().with("user_id", signed_up.user.id.as_str()).with("blood_type", "O+"))
//!     .execute()?;
//!
//! let donors = client.from("donor_profiles").select("*").eq("blood_type", "O+").execute()?;
//! assert_eq!(donors.data.len(), 1);
//! # Ok::<(), lifelink_core::error::StoreError>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function returns a JSON-encoded [`app_response::AppResponse`] that
//! the caller releases with [`free_response`]:
//!
//! - [`create_store`] - Open an LMDB-backed client from a JSON config
//! - [`auth_sign_up`] / [`auth_sign_in`] / [`auth_sign_out`]
//! - [`auth_get_session`] / [`auth_get_user`]
//! - [`table_query`] - Run a [`query::QueryRequest`]
//! - [`search_donors`] - Available donors by blood type, nearest first
//! - [`close_store`] - Flush and release the client

pub mod app_response;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod lifelink;
pub mod local_db_model;
pub mod local_db_state;
pub mod query;
pub mod realtime;
pub mod records;
pub mod storage;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::de::DeserializeOwned;

use crate::app_response::AppResponse;
use crate::auth::{SignInRequest, SignUpRequest};
use crate::client::LmdbClient;
use crate::config::StoreConfig;
use crate::lifelink::{DonorSearch, LifeLink};
use crate::query::QueryRequest;

/// Opens an LMDB-backed client.
///
/// `config_json` is a [`StoreConfig`] object; missing fields take their
/// defaults, so `"{}"` opens `./lifelink.lmdb`.
///
/// # Returns
///
/// A client pointer, or null if the config is invalid or the environment
/// cannot be opened. Release it with [`close_store`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(config_json: *const c_char) -> *mut LmdbClient {
    if config_json.is_null() {
        warn!("Null config pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let json = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = match StoreConfig::from_json(json) {
        Ok(config) => config,
        Err(e) => {
            warn!("❌ Rejected store config: {e}");
            return std::ptr::null_mut();
        }
    };

    match LmdbClient::open(&config) {
        Ok(client) => {
            info!("✅ Store opened at {}", config.db_path().display());
            Box::into_raw(Box::new(client))
        }
        Err(e) => {
            warn!("❌ Failed to open store: {e}");
            warn!("Attempted path: {}", config.db_path().display());
            std::ptr::null_mut()
        }
    }
}

/// Registers a user from a JSON [`SignUpRequest`]
/// (`{"email", "password", "full_name", "role"}`), assigning the role and
/// creating the initial donor or seeker profile.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn auth_sign_up(state: *mut LmdbClient, json_ptr: *const c_char) -> *const c_char {
    let client = match client_ref(state, "auth_sign_up") {
        Ok(client) => client,
        Err(err) => return err,
    };
    let request: SignUpRequest = match parse_json_arg(json_ptr, "JSON") {
        Ok(request) => request,
        Err(err) => return err,
    };

    match LifeLink::new(client).register(request) {
        Ok(response) => response_to_c_string(&AppResponse::json(&response)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Signs in from a JSON [`SignInRequest`] and reports the resolved role.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn auth_sign_in(state: *mut LmdbClient, json_ptr: *const c_char) -> *const c_char {
    let client = match client_ref(state, "auth_sign_in") {
        Ok(client) => client,
        Err(err) => return err,
    };
    let request: SignInRequest = match parse_json_arg(json_ptr, "JSON") {
        Ok(request) => request,
        Err(err) => return err,
    };

    match LifeLink::new(client).sign_in(&request.email, &request.password) {
        Ok(outcome) => response_to_c_string(&AppResponse::json(&outcome)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn auth_sign_out(state: *mut LmdbClient) -> *const c_char {
    let client = match client_ref(state, "auth_sign_out") {
        Ok(client) => client,
        Err(err) => return err,
    };

    match client.auth().sign_out() {
        Ok(()) => response_to_c_string(&AppResponse::success("Signed out")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// The current session as JSON, or `null` inside the `Ok` payload.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn auth_get_session(state: *mut LmdbClient) -> *const c_char {
    match client_ref(state, "auth_get_session") {
        Ok(client) => response_to_c_string(&AppResponse::json(&client.auth().get_session())),
        Err(err) => err,
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn auth_get_user(state: *mut LmdbClient) -> *const c_char {
    match client_ref(state, "auth_get_user") {
        Ok(client) => response_to_c_string(&AppResponse::json(&client.auth().get_user())),
        Err(err) => err,
    }
}

/// Runs a JSON [`QueryRequest`] and returns the `{data, count}` response.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn table_query(state: *mut LmdbClient, json_ptr: *const c_char) -> *const c_char {
    let client = match client_ref(state, "table_query") {
        Ok(client) => client,
        Err(err) => return err,
    };
    let request: QueryRequest = match parse_json_arg(json_ptr, "query") {
        Ok(request) => request,
        Err(err) => return err,
    };

    match client.run(request) {
        Ok(response) => response_to_c_string(&AppResponse::json(&response)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Runs a JSON [`DonorSearch`] (`{"blood_type": "O+", "origin": {"lat", "lng"}}`).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn search_donors(state: *mut LmdbClient, json_ptr: *const c_char) -> *const c_char {
    let client = match client_ref(state, "search_donors") {
        Ok(client) => client,
        Err(err) => return err,
    };
    let search: DonorSearch = match parse_json_arg(json_ptr, "search") {
        Ok(search) => search,
        Err(err) => return err,
    };

    match LifeLink::new(client).search_donors(&search) {
        Ok(donors) => response_to_c_string(&AppResponse::json(&donors)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Flushes the environment and frees the client. `state` must not be used
/// afterwards.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut LmdbClient) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_store".to_string());
        return response_to_c_string(&error);
    }

    let client = unsafe { Box::from_raw(state) };
    let result = client.store().close_database();
    drop(client);

    match result {
        Ok(()) => response_to_c_string(&AppResponse::success("Store closed successfully")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Releases a string returned by any function in this module.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr as *mut c_char) });
}

/// Converts an [`AppResponse`] to a C string. Null if serialization fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

fn client_ref<'a>(state: *mut LmdbClient, caller: &str) -> Result<&'a LmdbClient, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(client) => Ok(client),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Converts a C string pointer to a Rust String, reporting null pointers and
/// invalid UTF-8 as `BadRequest`.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn parse_json_arg<T: DeserializeOwned>(ptr: *const c_char, field_name: &str) -> Result<T, *const c_char> {
    let json = c_ptr_to_string(ptr, field_name)?;
    serde_json::from_str(&json).map_err(|e| {
        let error = AppResponse::SerializationError(format!("Invalid {field_name}: {e}"));
        response_to_c_string(&error)
    })
}
