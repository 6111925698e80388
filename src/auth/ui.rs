use std::fmt;
use std::io::{self, BufRead, Write};

const PASSWORD_ENV: &str = "CHATLINE_PASSWORD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct UiError {
    message: String,
}

impl UiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UiError {}

/// Ask for login credentials on the terminal. The password may come from
/// `CHATLINE_PASSWORD` instead, for scripted logins.
pub fn prompt_credentials(email: Option<String>) -> Result<Credentials, UiError> {
    println!("🔐 Log in to the chat backend");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let email = match email {
        Some(email) => email,
        None => prompt_line(&mut input, "Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => prompt_line(&mut input, "Password: ")?,
    };

    parse_credentials(&email, &password)
}

fn prompt_line(input: &mut impl BufRead, prompt: &str) -> Result<String, UiError> {
    print!("{prompt}");
    io::stdout()
        .flush()
        .map_err(|err| UiError::new(err.to_string()))?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|err| UiError::new(err.to_string()))?;
    if read == 0 {
        return Err(UiError::new("Input closed before login completed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_credentials(email: &str, password: &str) -> Result<Credentials, UiError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(UiError::new("A valid email address is required"));
    }
    if password.is_empty() {
        return Err(UiError::new("Password cannot be empty"));
    }
    Ok(Credentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}
