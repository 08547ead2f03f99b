use serde_json::json;

use crate::diag::Diagnostics;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster;

const INVALID: &str = "invalid username or password";

/// One failure shape on purpose: the caller cannot tell an unknown user
/// from a wrong password, and the roster is re-read on every attempt.
fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let username = req
        .params
        .get("username")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if username.is_empty() || password.is_empty() {
        return err(&req.id, "invalid_credentials", INVALID, None);
    }

    let mut diags = Diagnostics::new();
    let users = match state.data_root.as_deref() {
        Some(root) => roster::load_users(root, &mut diags),
        None => Vec::new(),
    };

    match roster::verify(&users, username, password) {
        Some(user) => ok(
            &req.id,
            json!({ "username": user.username, "role": user.role.as_str() }),
        ),
        None => err(&req.id, "invalid_credentials", INVALID, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
