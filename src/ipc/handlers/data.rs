use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::repository::{self, Scan};
use crate::roster::Role;

/// Every data method walks the source files again; no scan outlives its
/// request.
fn scan(state: &AppState) -> Scan {
    match state.data_root.as_deref() {
        Some(root) => repository::scan_all(root),
        None => Scan::default(),
    }
}

fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

/// Caller identity as asserted by the shell that owns the session.
fn caller_role(req: &Request) -> Option<Role> {
    param_str(req, "role").and_then(Role::parse)
}

fn handle_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let scan = scan(state);
    ok(
        &req.id,
        json!({
            "classes": repository::class_names(&scan),
            "diagnostics": scan.diagnostics
        }),
    )
}

fn handle_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class) = param_str(req, "class") else {
        return err(&req.id, "bad_params", "missing params.class", None);
    };
    let scan = scan(state);
    ok(
        &req.id,
        json!({ "subjects": repository::subject_names(&scan, class) }),
    )
}

fn handle_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(role) = caller_role(req) else {
        return err(&req.id, "bad_params", "missing or invalid params.role", None);
    };
    if role == Role::Student {
        return err(&req.id, "forbidden", "students cannot view batch data", None);
    }
    let Some(class) = param_str(req, "class") else {
        return err(&req.id, "bad_params", "missing params.class", None);
    };
    let subject = param_str(req, "subject");

    let scan = scan(state);
    ok(
        &req.id,
        json!({
            "subjects": repository::subjects_for(&scan, class, subject),
            "diagnostics": scan.diagnostics
        }),
    )
}

fn handle_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(role) = caller_role(req) else {
        return err(&req.id, "bad_params", "missing or invalid params.role", None);
    };
    let Some(student) = param_str(req, "student") else {
        return err(&req.id, "bad_params", "missing params.student", None);
    };
    if role == Role::Student {
        let me = param_str(req, "username").unwrap_or("");
        if me != student {
            return err(
                &req.id,
                "forbidden",
                "students may only view their own records",
                None,
            );
        }
    }

    let scan = scan(state);
    ok(
        &req.id,
        json!({
            "records": repository::student_history(&scan, student),
            "diagnostics": scan.diagnostics
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.classes" => Some(handle_classes(state, req)),
        "data.subjects" => Some(handle_subjects(state, req)),
        "data.batch" => Some(handle_batch(state, req)),
        "data.student" => Some(handle_student(state, req)),
        _ => None,
    }
}
