//! Job metadata travels in three response headers (`X-Tile`, `X-Height`,
//! `X-Width`) so the tile payload can be streamed as the raw body. The codec
//! only touches headers; it never buffers the body.
//!
//! Tile names are percent-encoded on the wire, so any UTF-8 name survives the
//! trip. Result uploads carry the name in an RFC 5987 `filename*` parameter.

use std::borrow::Cow;

use http::{HeaderMap, HeaderName, HeaderValue};
use tilecast_model::JobHeader;

use crate::{api_routes::headers, error::WireError, job::Job, stream::ByteStream};

pub const TILE_HEADER: HeaderName = HeaderName::from_static(headers::TILE);
pub const HEIGHT_HEADER: HeaderName = HeaderName::from_static(headers::HEIGHT);
pub const WIDTH_HEADER: HeaderName = HeaderName::from_static(headers::WIDTH);

pub fn encode_header(header: &JobHeader, map: &mut HeaderMap) -> Result<(), WireError> {
    let tile = HeaderValue::from_str(&urlencoding::encode(&header.tile_name))
        .map_err(|_| WireError::InvalidTileName(header.tile_name.clone()))?;

    map.insert(TILE_HEADER, tile);
    map.insert(HEIGHT_HEADER, HeaderValue::from(header.height));
    map.insert(WIDTH_HEADER, HeaderValue::from(header.width));
    Ok(())
}

pub fn decode_header(map: &HeaderMap) -> Result<JobHeader, WireError> {
    let tile_name = match map.get(TILE_HEADER) {
        None => return Err(WireError::MissingTileName),
        Some(value) => decode_name(value.as_bytes())?,
    };
    if tile_name.is_empty() {
        return Err(WireError::MissingTileName);
    }

    let height = dimension(map, headers::HEIGHT)?;
    let width = dimension(map, headers::WIDTH)?;

    Ok(JobHeader::new(tile_name, width, height))
}

fn decode_name(raw: &[u8]) -> Result<String, WireError> {
    let invalid = || WireError::InvalidTileName(String::from_utf8_lossy(raw).into_owned());
    let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
    urlencoding::decode(text)
        .map(Cow::into_owned)
        .map_err(|_| invalid())
}

fn dimension(map: &HeaderMap, name: &'static str) -> Result<u32, WireError> {
    let raw = map
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    raw.trim()
        .parse::<u32>()
        .map_err(|_| WireError::MalformedDimension {
            field: name,
            value: raw,
        })
}

/// Write `job`'s metadata into `map` and release its body for streaming.
pub fn encode(job: Job, map: &mut HeaderMap) -> Result<ByteStream, WireError> {
    let (header, body) = job.into_parts();
    encode_header(&header, map)?;
    Ok(body)
}

/// Rebuild a job from response headers and its still-unread body.
pub fn decode(map: &HeaderMap, body: ByteStream) -> Result<Job, WireError> {
    Ok(Job::new(decode_header(map)?, body))
}

/// `Content-Disposition` value naming an uploaded result.
pub fn attachment_disposition(file_name: &str) -> Result<HeaderValue, WireError> {
    let value = format!("attachment; filename*=UTF-8''{}", urlencoding::encode(file_name));
    HeaderValue::from_str(&value).map_err(|_| WireError::InvalidTileName(file_name.to_string()))
}

/// Extract the file name from a `Content-Disposition` value.
///
/// `filename*` wins over `filename`. Plain names may be quoted, with
/// backslash escapes, or bare.
pub fn attachment_filename(value: &str) -> Option<String> {
    let mut params = split_params(value).into_iter();
    let disposition = params.next()?;
    if disposition.is_empty() || disposition.contains('=') {
        return None;
    }

    let mut plain = None;
    let mut extended = None;
    for param in params {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let (key, raw) = (key.trim(), raw.trim());
        if key.eq_ignore_ascii_case("filename*") {
            extended = extended.or_else(|| decode_ext_value(raw));
        } else if key.eq_ignore_ascii_case("filename") {
            plain = plain.or_else(|| Some(unquote(raw)));
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Split on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let (mut start, mut quoted, mut escaped) = (0, false, false);
    for (at, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(value[start..at].trim());
                start = at + 1;
            }
            _ => {}
        }
    }
    params.push(value[start..].trim());
    params
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }
    out
}

/// `charset'language'percent-encoded`; only UTF-8 is accepted.
fn decode_ext_value(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(Cow::into_owned)
}
