use crate::error::LoginParseError;

pub const LOGIN_HEADER_LEN: usize = 18;
pub const LOGIN_OFFSET: i16 = -3;
pub const PASSWORD_OFFSET: i16 = 1;
const DIGIT_THRESHOLD: u16 = 10;
const CYRILLIC_COUNT: u16 = 64;
const CYRILLIC_UPPER_A: u32 = 0x0410;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub login: String,
    pub password: String,
}

/// Raw credential runs as they sit in the payload, before decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRuns<'a> {
    pub login: &'a [u8],
    pub password: &'a [u8],
}

pub fn scan_login_payload(payload: &[u8]) -> Result<LoginRuns<'_>, LoginParseError> {
    if payload.len() <= LOGIN_HEADER_LEN {
        return Err(LoginParseError::TooShort(payload.len()));
    }
    let body = &payload[LOGIN_HEADER_LEN..];
    let delimiter = body
        .iter()
        .position(|&byte| byte == 0x00 || byte == 0x01)
        .ok_or(LoginParseError::MissingDelimiter)?;
    let login = &body[..delimiter];
    let rest = &body[delimiter + 1..];
    let end = rest.iter().position(|&byte| byte == 0x00).unwrap_or(rest.len());
    let password = &rest[..end];
    if login.is_empty() {
        return Err(LoginParseError::EmptyField("login"));
    }
    if password.is_empty() {
        return Err(LoginParseError::EmptyField("password"));
    }
    Ok(LoginRuns { login, password })
}

pub fn decrypt_byte(byte: u8, offset: i16) -> Option<char> {
    let value = i16::from(byte) + offset;
    if value < 2 {
        return None;
    }
    let value = value as u16;
    if value % 2 == 0 {
        let k = value / 2 - 1;
        match k {
            0..=25 => Some((b'A' + k as u8) as char),
            26..=51 => Some((b'a' + (k - 26) as u8) as char),
            _ => None,
        }
    } else {
        let k = (value - 3) / 2;
        if k < DIGIT_THRESHOLD {
            Some((b'0' + k as u8) as char)
        } else if k < DIGIT_THRESHOLD + CYRILLIC_COUNT {
            char::from_u32(CYRILLIC_UPPER_A + u32::from(k - DIGIT_THRESHOLD))
        } else {
            None
        }
    }
}

pub fn encrypt_char(ch: char, offset: i16) -> Option<u8> {
    let value: u16 = match ch {
        'A'..='Z' => (u16::from(ch as u8 - b'A') + 1) * 2,
        'a'..='z' => (u16::from(ch as u8 - b'a') + 27) * 2,
        '0'..='9' => u16::from(ch as u8 - b'0') * 2 + 3,
        _ => {
            let code = (ch as u32).checked_sub(CYRILLIC_UPPER_A)?;
            if code >= u32::from(CYRILLIC_COUNT) {
                return None;
            }
            (code as u16 + DIGIT_THRESHOLD) * 2 + 3
        }
    };
    u8::try_from(value as i16 - offset).ok()
}

fn decrypt_run(run: &[u8], offset: i16, field: &'static str) -> Result<String, LoginParseError> {
    run.iter()
        .map(|&byte| decrypt_byte(byte, offset).ok_or(LoginParseError::BadByte { field, byte }))
        .collect()
}

pub fn parse_login_payload(payload: &[u8]) -> Result<LoginCredentials, LoginParseError> {
    let runs = scan_login_payload(payload)?;
    Ok(LoginCredentials {
        login: decrypt_run(runs.login, LOGIN_OFFSET, "login")?,
        password: decrypt_run(runs.password, PASSWORD_OFFSET, "password")?,
    })
}

/// Client-side payload layout, padded with zeros to `min_len`.
pub fn build_login_payload(
    login: &str,
    password: &str,
    min_len: usize,
) -> Option<Vec<u8>> {
    let mut payload = vec![0u8; LOGIN_HEADER_LEN];
    payload[0] = 0x28;
    payload[2] = 0x2C;
    payload[3] = 0x01;
    for ch in login.chars() {
        payload.push(encrypt_char(ch, LOGIN_OFFSET)?);
    }
    payload.push(0x01);
    for ch in password.chars() {
        payload.push(encrypt_char(ch, PASSWORD_OFFSET)?);
    }
    payload.push(0x00);
    if payload.len() < min_len {
        payload.resize(min_len, 0);
    }
    Some(payload)
}
