// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! HTML form binding and validation
//!
//! Each form is built from the raw urlencoded payload, validated against the
//! database where needed, and serialized back into the template so the user
//! sees their input alongside any errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth;
use crate::db::{Database, Post, User};
use crate::Result;

pub const REQUIRED: &str = "Это обязательное поле!";
pub const INVALID_CHOICE: &str = "Выберите корректный вариант.";
pub const INVALID_LOGIN: &str =
    "Пожалуйста, введите правильные имя пользователя и пароль. Оба поля могут быть чувствительны к регистру.";
pub const USERNAME_TAKEN: &str = "Пользователь с таким именем уже существует.";
pub const INVALID_USERNAME: &str =
    "Введите правильное имя пользователя. Оно может содержать только буквы, цифры и знаки @/./+/-/_.";
pub const PASSWORD_MISMATCH: &str = "Введенные пароли не совпадают.";
pub const PASSWORD_TOO_SHORT: &str =
    "Введённый пароль слишком короткий. Он должен содержать как минимум 8 символов.";
pub const PASSWORD_NUMERIC: &str = "Введённый пароль состоит только из цифр.";
pub const INVALID_EMAIL: &str = "Введите правильный адрес электронной почты.";
pub const TOO_LONG: &str = "Убедитесь, что это значение содержит не более 150 символов.";

const PASSWORD_MIN: usize = 8;

// Letters, digits and @/./+/-/_, Unicode letters included
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("hardcoded username regex is invalid")
});

/// One input as the template sees it
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
    pub value: String,
    pub errors: Vec<String>,
}

impl Field {
    fn new(name: &'static str, label: &'static str, required: bool) -> Self {
        Self {
            name,
            label,
            help_text: "",
            required,
            value: String::new(),
            errors: Vec::new(),
        }
    }

    fn help(mut self, help_text: &'static str) -> Self {
        self.help_text = help_text;
        self
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    fn error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    /// Trimmed value, recording a required-field error when blank
    fn cleaned(&mut self) -> Option<String> {
        let value = self.value.trim().to_string();
        if value.is_empty() {
            if self.required {
                self.error(REQUIRED);
            }
            return None;
        }
        Some(value)
    }
}

// === Post form ===

/// Raw create/edit payload
#[derive(Debug, Default, Deserialize)]
pub struct PostFormData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
}

/// Post create/edit form
#[derive(Debug, Clone, Serialize)]
pub struct PostForm {
    pub text: Field,
    pub group: Field,
}

/// Validated post fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
}

impl PostForm {
    pub fn unbound() -> Self {
        Self {
            text: Field::new("text", "Текст поста", true).help("Напишите что-нибудь здесь!"),
            group: Field::new("group", "Группа", false),
        }
    }

    /// Form pre-filled from an existing post
    pub fn for_post(post: &Post) -> Self {
        let mut form = Self::unbound();
        form.text = form.text.with_value(post.text.as_str());
        form.group = form
            .group
            .with_value(post.group.as_ref().map(|g| g.id.to_string()).unwrap_or_default());
        form
    }

    pub fn bind(data: PostFormData) -> Self {
        let mut form = Self::unbound();
        form.text = form.text.with_value(data.text);
        form.group = form.group.with_value(data.group);
        form
    }

    /// Validate, returning the clean fields or `None` with errors recorded
    pub fn clean(&mut self, db: &Database) -> Result<Option<CleanPost>> {
        let text = self.text.cleaned();

        let group_id = match self.group.cleaned() {
            None => None,
            Some(raw) => {
                let found = match raw.parse::<i64>() {
                    Ok(id) => db.group_by_id(id)?.map(|group| group.id),
                    Err(_) => None,
                };
                if found.is_none() {
                    self.group.error(INVALID_CHOICE);
                }
                found
            }
        };

        if !self.is_valid() {
            return Ok(None);
        }
        Ok(text.map(|text| CleanPost { text, group_id }))
    }

    pub fn is_valid(&self) -> bool {
        self.text.errors.is_empty() && self.group.errors.is_empty()
    }
}

// === Login form ===

#[derive(Debug, Default, Deserialize)]
pub struct LoginFormData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

/// Username/password login form
#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    pub username: Field,
    pub password: Field,
    pub next: String,
    pub non_field_errors: Vec<String>,
}

impl LoginForm {
    pub fn unbound(next: Option<String>) -> Self {
        Self {
            username: Field::new("username", "Имя пользователя", true),
            password: Field::new("password", "Пароль", true),
            next: next.unwrap_or_default(),
            non_field_errors: Vec::new(),
        }
    }

    pub fn bind(data: LoginFormData) -> Self {
        let mut form = Self::unbound(Some(data.next));
        form.username = form.username.with_value(data.username);
        form.password = form.password.with_value(data.password);
        form
    }

    /// The authenticated user, or `None` with errors recorded
    pub fn clean(&mut self, db: &Database) -> Result<Option<User>> {
        let username = self.username.cleaned();
        let password = std::mem::take(&mut self.password.value);
        if password.is_empty() {
            self.password.error(REQUIRED);
        }
        let Some(username) = username else {
            return Ok(None);
        };
        if password.is_empty() {
            return Ok(None);
        }

        let user = match db.user_by_username(&username)? {
            Some(user) if auth::verify_password(&password, &user.password_hash)? => user,
            _ => {
                self.non_field_errors.push(INVALID_LOGIN.to_string());
                return Ok(None);
            }
        };
        Ok(Some(user))
    }

    /// Post-login destination, falling back to the index
    pub fn redirect_target(&self) -> &str {
        if auth::is_safe_redirect(&self.next) {
            &self.next
        } else {
            "/"
        }
    }
}

// === Signup form ===

#[derive(Debug, Default, Deserialize)]
pub struct SignupFormData {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Registration form
#[derive(Debug, Clone, Serialize)]
pub struct SignupForm {
    pub first_name: Field,
    pub last_name: Field,
    pub username: Field,
    pub email: Field,
    pub password1: Field,
    pub password2: Field,
}

/// Validated registration fields
#[derive(Debug, Clone)]
pub struct CleanSignup {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub password: String,
}

impl SignupForm {
    pub fn unbound() -> Self {
        Self {
            first_name: Field::new("first_name", "Имя", false),
            last_name: Field::new("last_name", "Фамилия", false),
            username: Field::new("username", "Имя пользователя", true)
                .help("Не более 150 символов. Только буквы, цифры и символы @/./+/-/_."),
            email: Field::new("email", "Адрес электронной почты", false),
            password1: Field::new("password1", "Пароль", true)
                .help("Пароль должен содержать как минимум 8 символов и не состоять только из цифр."),
            password2: Field::new("password2", "Подтверждение пароля", true),
        }
    }

    pub fn bind(data: SignupFormData) -> Self {
        let mut form = Self::unbound();
        form.first_name = form.first_name.with_value(data.first_name);
        form.last_name = form.last_name.with_value(data.last_name);
        form.username = form.username.with_value(data.username);
        form.email = form.email.with_value(data.email);
        form.password1 = form.password1.with_value(data.password1);
        form.password2 = form.password2.with_value(data.password2);
        form
    }

    pub fn clean(&mut self, db: &Database) -> Result<Option<CleanSignup>> {
        let rules = SignupRules {
            first_name: self.first_name.cleaned().unwrap_or_default(),
            last_name: self.last_name.cleaned().unwrap_or_default(),
            username: self.username.cleaned(),
            email: self.email.cleaned(),
        };
        self.apply_rules(&rules);

        if let Some(name) = &rules.username {
            if self.username.errors.is_empty() && db.user_by_username(name)?.is_some() {
                self.username.error(USERNAME_TAKEN);
            }
        }

        // Passwords never go back to the browser
        let password1 = std::mem::take(&mut self.password1.value);
        let password2 = std::mem::take(&mut self.password2.value);
        if password1.is_empty() {
            self.password1.error(REQUIRED);
        }
        if password2.is_empty() {
            self.password2.error(REQUIRED);
        } else if password1 != password2 {
            self.password2.error(PASSWORD_MISMATCH);
        } else {
            for problem in password_problems(&password1) {
                self.password2.error(problem);
            }
        }

        if !self.is_valid() {
            return Ok(None);
        }
        let SignupRules { first_name, last_name, username, .. } = rules;
        Ok(username.map(|username| CleanSignup {
            first_name,
            last_name,
            username,
            password: password1,
        }))
    }

    /// Record rule violations against the matching inputs
    fn apply_rules(&mut self, rules: &SignupRules) {
        let Err(errors) = rules.validate() else {
            return;
        };
        let by_field = errors.field_errors();
        for field in [&mut self.first_name, &mut self.last_name, &mut self.username, &mut self.email] {
            if let Some(list) = by_field.get(field.name) {
                for error in list.iter() {
                    field.error(rule_message(&error.code));
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.username,
            &self.email,
            &self.password1,
            &self.password2,
        ]
        .iter()
        .all(|field| field.errors.is_empty())
    }
}

/// Length, charset and email rules of the registration form
#[derive(Debug, Default, Validate)]
struct SignupRules {
    #[validate(length(max = 150))]
    first_name: String,
    #[validate(length(max = 150))]
    last_name: String,
    #[validate(length(max = 150), custom(function = "username_chars"))]
    username: Option<String>,
    #[validate(email)]
    email: Option<String>,
}

fn username_chars(name: &str) -> std::result::Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

fn rule_message(code: &str) -> &'static str {
    match code {
        "length" => TOO_LONG,
        "email" => INVALID_EMAIL,
        _ => INVALID_USERNAME,
    }
}

/// `[\w.@+-]+`, at most 150 characters
pub fn valid_username(name: &str) -> bool {
    SignupRules { username: Some(name.to_string()), ..Default::default() }
        .validate()
        .is_ok()
}

fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN {
        problems.push(PASSWORD_TOO_SHORT);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(PASSWORD_NUMERIC);
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;

    fn db_with_group() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let group = db.create_group("Cats", "cats", "").unwrap();
        (db, group.id)
    }

    #[test]
    fn test_post_form_trims_text() {
        let (db, group_id) = db_with_group();
        let mut form = PostForm::bind(PostFormData {
            text: "  hello  ".to_string(),
            group: group_id.to_string(),
        });
        let clean = form.clean(&db).unwrap().unwrap();
        assert_eq!(clean, CleanPost { text: "hello".to_string(), group_id: Some(group_id) });
    }

    #[test]
    fn test_post_form_blank_text_is_required() {
        let (db, _) = db_with_group();
        let mut form = PostForm::bind(PostFormData { text: "   \n".to_string(), group: String::new() });
        assert!(form.clean(&db).unwrap().is_none());
        assert_eq!(form.text.errors, vec![REQUIRED.to_string()]);
        assert!(form.group.errors.is_empty());
    }

    #[test]
    fn test_post_form_group_is_optional() {
        let (db, _) = db_with_group();
        let mut form = PostForm::bind(PostFormData { text: "no group".to_string(), group: String::new() });
        assert_eq!(form.clean(&db).unwrap().unwrap().group_id, None);
    }

    #[test]
    fn test_post_form_unknown_group_rejected() {
        let (db, _) = db_with_group();
        for bad in ["999", "cats", "-1"] {
            let mut form = PostForm::bind(PostFormData { text: "x".to_string(), group: bad.to_string() });
            assert!(form.clean(&db).unwrap().is_none(), "{bad} accepted");
            assert_eq!(form.group.errors, vec![INVALID_CHOICE.to_string()]);
        }
    }

    #[test]
    fn test_login_form_checks_password() {
        let db = Database::in_memory().unwrap();
        let hash = auth::hash_password("letmein99").unwrap();
        db.create_user(&NewUser { username: "leo", password_hash: &hash, ..Default::default() })
            .unwrap();

        let mut good = LoginForm::bind(LoginFormData {
            username: "leo".to_string(),
            password: "letmein99".to_string(),
            next: "/create/".to_string(),
        });
        assert_eq!(good.clean(&db).unwrap().map(|u| u.username), Some("leo".to_string()));
        assert_eq!(good.redirect_target(), "/create/");

        let mut bad = LoginForm::bind(LoginFormData {
            username: "leo".to_string(),
            password: "nope".to_string(),
            next: "https://evil.example".to_string(),
        });
        assert!(bad.clean(&db).unwrap().is_none());
        assert_eq!(bad.non_field_errors, vec![INVALID_LOGIN.to_string()]);
        assert!(bad.password.value.is_empty());
        assert_eq!(bad.redirect_target(), "/");
    }

    #[test]
    fn test_login_form_required_fields() {
        let db = Database::in_memory().unwrap();
        let mut form = LoginForm::bind(LoginFormData::default());
        assert!(form.clean(&db).unwrap().is_none());
        assert_eq!(form.username.errors, vec![REQUIRED.to_string()]);
        assert_eq!(form.password.errors, vec![REQUIRED.to_string()]);
        assert!(form.non_field_errors.is_empty());
    }

    fn signup(username: &str, p1: &str, p2: &str) -> SignupFormData {
        SignupFormData {
            username: username.to_string(),
            password1: p1.to_string(),
            password2: p2.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_signup_form_valid() {
        let db = Database::in_memory().unwrap();
        let mut form = SignupForm::bind(SignupFormData {
            first_name: "Leo".to_string(),
            email: "leo@example.com".to_string(),
            ..signup("leo.t", "war&peace1869", "war&peace1869")
        });
        let clean = form.clean(&db).unwrap().unwrap();
        assert_eq!(clean.username, "leo.t");
        assert_eq!(clean.first_name, "Leo");
        assert!(form.password1.value.is_empty());
    }

    #[test]
    fn test_signup_form_password_rules() {
        let db = Database::in_memory().unwrap();

        let mut mismatch = SignupForm::bind(signup("leo", "abcdefgh1", "abcdefgh2"));
        assert!(mismatch.clean(&db).unwrap().is_none());
        assert_eq!(mismatch.password2.errors, vec![PASSWORD_MISMATCH.to_string()]);

        let mut weak = SignupForm::bind(signup("leo", "1234", "1234"));
        assert!(weak.clean(&db).unwrap().is_none());
        assert_eq!(
            weak.password2.errors,
            vec![PASSWORD_TOO_SHORT.to_string(), PASSWORD_NUMERIC.to_string()]
        );
    }

    #[test]
    fn test_signup_form_username_rules() {
        let db = Database::in_memory().unwrap();
        db.create_user(&NewUser { username: "taken", password_hash: "x", ..Default::default() })
            .unwrap();

        let mut taken = SignupForm::bind(signup("taken", "abcdefgh1", "abcdefgh1"));
        assert!(taken.clean(&db).unwrap().is_none());
        assert_eq!(taken.username.errors, vec![USERNAME_TAKEN.to_string()]);

        let mut spaced = SignupForm::bind(signup("two words", "abcdefgh1", "abcdefgh1"));
        assert!(spaced.clean(&db).unwrap().is_none());
        assert_eq!(spaced.username.errors, vec![INVALID_USERNAME.to_string()]);
    }

    #[test]
    fn test_username_charset() {
        assert!(valid_username("Лев_Толстой"));
        assert!(valid_username("a.b@c+d-e"));
        assert!(!valid_username("slash/"));
        assert!(!valid_username(&"x".repeat(151)));
    }

    #[test]
    fn test_signup_form_rejects_malformed_email() {
        let db = Database::in_memory().unwrap();
        for bad in ["a b@c.d", "a@b@c.d", "a@b..c", "<x>@y.z", "plain", "@b.ru"] {
            let mut form = SignupForm::bind(SignupFormData {
                email: bad.to_string(),
                ..signup("leo", "abcdefgh1", "abcdefgh1")
            });
            assert!(form.clean(&db).unwrap().is_none(), "{bad} accepted");
            assert_eq!(form.email.errors, vec![INVALID_EMAIL.to_string()]);
            assert_eq!(form.email.value, bad);
        }
    }

    #[test]
    fn test_signup_form_name_length_limit() {
        let db = Database::in_memory().unwrap();
        let mut form = SignupForm::bind(SignupFormData {
            first_name: "Л".repeat(151),
            last_name: "Толстой".to_string(),
            ..signup("leo", "abcdefgh1", "abcdefgh1")
        });
        assert!(form.clean(&db).unwrap().is_none());
        assert_eq!(form.first_name.errors, vec![TOO_LONG.to_string()]);
        assert!(form.last_name.errors.is_empty());

        let mut long_name = SignupForm::bind(signup(&"x".repeat(151), "abcdefgh1", "abcdefgh1"));
        assert!(long_name.clean(&db).unwrap().is_none());
        assert_eq!(long_name.username.errors, vec![TOO_LONG.to_string()]);
    }
}
