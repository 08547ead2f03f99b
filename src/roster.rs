use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use serde::Serialize;

use crate::cell::{self, CellValue};
use crate::diag::Diagnostics;

/// The login workbook lives directly under the data root.
const LOGIN_FILE: &str = "LoginData.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

/// A roster row. The password is verification-only and never serialized
/// outward.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: Role,
}

/// Reads the credential roster from the login workbook's first sheet.
/// A missing workbook is an empty roster, not an error.
pub fn load_users(data_root: &Path, diags: &mut Diagnostics) -> Vec<User> {
    let path = data_root.join(LOGIN_FILE);
    if !path.is_file() {
        return Vec::new();
    }
    let mut workbook: Xlsx<_> = match open_workbook(&path) {
        Ok(wb) => wb,
        Err(e) => {
            diags.warn("roster_unreadable", format!("{}: {}", path.display(), e));
            return Vec::new();
        }
    };
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(r)) => r,
        Some(Err(e)) => {
            diags.warn("roster_unreadable", format!("{}: {}", path.display(), e));
            return Vec::new();
        }
        None => return Vec::new(),
    };
    users_from_grid(&cell::grid_from_range(&range))
}

/// Maps header-keyed rows to users. Column headers match case-insensitively;
/// rows without both a username and a password are dropped.
pub fn users_from_grid(grid: &[Vec<CellValue>]) -> Vec<User> {
    let Some(header) = grid.first() else {
        return Vec::new();
    };
    let col = |label: &str| {
        header
            .iter()
            .position(|c| c.display().trim().eq_ignore_ascii_case(label))
    };
    let (Some(user_col), Some(pass_col)) = (col("username"), col("password")) else {
        return Vec::new();
    };
    let role_col = col("role");

    let mut users = Vec::new();
    for row in &grid[1..] {
        let username = row
            .get(user_col)
            .map(CellValue::display)
            .unwrap_or_default()
            .trim()
            .to_string();
        let password = row
            .get(pass_col)
            .map(CellValue::display)
            .unwrap_or_default()
            .trim()
            .to_string();
        if username.is_empty() || password.is_empty() {
            continue;
        }
        let role = role_col
            .and_then(|i| row.get(i))
            .map(CellValue::display)
            .and_then(|s| Role::parse(&s))
            .unwrap_or_else(|| fallback_role(&username));
        users.push(User {
            username,
            password,
            role,
        });
    }
    users
}

/// Role fallback for roster rows that predate the role column.
fn fallback_role(username: &str) -> Role {
    let u = username.to_ascii_lowercase();
    if u == "srsma" {
        Role::Teacher
    } else if u.contains("admin") {
        Role::Admin
    } else if u.contains("teacher") {
        Role::Teacher
    } else {
        Role::Student
    }
}

/// The single credential check. Stored values carrying the bcrypt prefix
/// verify as salted hashes; everything else compares as plain text. The
/// caller learns only success or failure, never which half failed.
pub fn verify<'a>(users: &'a [User], username: &str, password: &str) -> Option<&'a User> {
    let user = users
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(username))?;
    let ok = if user.password.starts_with("$2") {
        bcrypt::verify(password, &user.password).unwrap_or(false)
    } else {
        user.password == password
    };
    ok.then_some(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn roster_grid() -> Vec<Vec<CellValue>> {
        vec![
            vec![t("Username"), t("PASSWORD"), t("Role")],
            vec![t(" amit "), t("12345"), t("Student")],
            vec![t("srsma"), t("letmein")],
            vec![t("schooladmin"), t("hunter2")],
            vec![t("scienceteacher"), t("secret")],
            vec![t(""), t("orphan")],
            vec![t("nopass"), t("")],
        ]
    }

    #[test]
    fn header_columns_match_case_insensitively() {
        let users = users_from_grid(&roster_grid());
        assert_eq!(users.len(), 4);
        assert_eq!(users[0].username, "amit");
        assert_eq!(users[0].password, "12345");
        assert_eq!(users[0].role, Role::Student);
    }

    #[test]
    fn missing_roles_fall_back_to_the_username_heuristic() {
        let users = users_from_grid(&roster_grid());
        assert_eq!(users[1].role, Role::Teacher); // fixed identifier
        assert_eq!(users[2].role, Role::Admin);
        assert_eq!(users[3].role, Role::Teacher);
    }

    #[test]
    fn rows_without_credentials_are_dropped() {
        let users = users_from_grid(&roster_grid());
        assert!(users.iter().all(|u| !u.username.is_empty()));
        assert!(users.iter().all(|u| !u.password.is_empty()));
    }

    #[test]
    fn numeric_password_cells_read_as_text() {
        let grid = vec![
            vec![t("username"), t("password")],
            vec![t("meera"), n(12345.0)],
        ];
        let users = users_from_grid(&grid);
        assert_eq!(users[0].password, "12345");
        assert!(verify(&users, "meera", "12345").is_some());
    }

    #[test]
    fn headerless_sheets_yield_no_users() {
        assert!(users_from_grid(&[]).is_empty());
        let grid = vec![vec![t("name"), t("secret")], vec![t("amit"), t("12345")]];
        assert!(users_from_grid(&grid).is_empty());
    }

    #[test]
    fn plaintext_passwords_match_on_exact_equality_only() {
        let users = users_from_grid(&roster_grid());
        assert!(verify(&users, "amit", "12345").is_some());
        // Username lookup is case-insensitive, the password is not.
        assert!(verify(&users, "AMIT", "12345").is_some());
        assert!(verify(&users, "amit", "12346").is_none());
        assert!(verify(&users, "amit", "12345 ").is_none());
        assert!(verify(&users, "ghost", "12345").is_none());
    }

    #[test]
    fn hashed_passwords_verify_through_bcrypt() {
        let hash = bcrypt::hash("12345", 4).expect("hash");
        let users = vec![User {
            username: "amit".to_string(),
            password: hash,
            role: Role::Student,
        }];
        assert!(verify(&users, "amit", "12345").is_some());
        assert!(verify(&users, "amit", "12346").is_none());
    }

    #[test]
    fn hash_prefixed_secrets_never_match_as_plain_text() {
        let hash = bcrypt::hash("12345", 4).expect("hash");
        let users = vec![User {
            username: "amit".to_string(),
            password: hash.clone(),
            role: Role::Student,
        }];
        // Presenting the stored string itself must not authenticate.
        assert!(verify(&users, "amit", &hash).is_none());
    }

    #[test]
    fn serialized_users_never_carry_the_password() {
        let user = User {
            username: "amit".to_string(),
            password: "12345".to_string(),
            role: Role::Student,
        };
        let v = serde_json::to_value(&user).expect("json");
        assert_eq!(v.get("username").and_then(|x| x.as_str()), Some("amit"));
        assert_eq!(v.get("role").and_then(|x| x.as_str()), Some("student"));
        assert!(v.get("password").is_none());
    }
}
