//! Classify `apitrace dump` output lines.
//!
//! Call lines look like this:
//! ```text
//! 12 Direct3DCreate9(SDKVersion = 32) = 0x00c4e2a0
//! 57 IDirect3DDevice9::SetRenderState(this = 0x00c4f3c0, State = D3DRS_ZENABLE, Value = 1) = D3D_OK
//! 58 IDirect3DDevice9::CreateQuery(this = 0x00c4f3c0, Type = D3DQUERYTYPE_EVENT, ppQuery = &0x0) = D3D_OK
//! 91 ID3D11Device::CreateQuery(this = 0x0, pQueryDesc = &{Query = D3D11_QUERY_EVENT, MiscFlags = 0x0}, ppQuery = &0x0) = S_OK
//! ```
//!
//! Everything else (argument dumps spanning several lines, shader disassembly,
//! blank lines, thread markers) is noise. A simpler marker form is accepted
//! too, for fixtures and wrappers that pre-digest the dump:
//! ```text
//! CALL glDrawArrays
//! RENDERSTATE D3DRS_ZENABLE
//! QUERY D3DQUERYTYPE_EVENT
//! ```

/// What a dump line contributes to the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRecord<'a> {
    /// One call of `function`
    Call { function: &'a str },
    /// A render state was set; `function` is the setter when the line was a call
    RenderState {
        function: Option<&'a str>,
        flag: &'a str,
    },
    /// A query object of `kind` was created
    QueryType {
        function: Option<&'a str>,
        kind: &'a str,
    },
    Noise,
}

impl<'a> LineRecord<'a> {
    /// The function this line counts as a call of, if any.
    pub fn function(&self) -> Option<&'a str> {
        match *self {
            LineRecord::Call { function } => Some(function),
            LineRecord::RenderState { function, .. } | LineRecord::QueryType { function, .. } => {
                function
            }
            LineRecord::Noise => None,
        }
    }
}

/// Classify one dump line. Never fails: unrecognized input is [`LineRecord::Noise`].
pub fn classify_line(line: &str) -> LineRecord<'_> {
    let line = line.trim();
    if let Some(record) = classify_marker(line) {
        return record;
    }
    classify_call(line).unwrap_or(LineRecord::Noise)
}

fn classify_marker(line: &str) -> Option<LineRecord<'_>> {
    let (marker, rest) = line.split_once(' ')?;
    let name = rest.trim();
    if !is_identifier(name) {
        return None;
    }
    match marker {
        "CALL" => Some(LineRecord::Call { function: name }),
        "RENDERSTATE" => Some(LineRecord::RenderState {
            function: None,
            flag: name,
        }),
        "QUERY" => Some(LineRecord::QueryType {
            function: None,
            kind: name,
        }),
        _ => None,
    }
}

fn classify_call(line: &str) -> Option<LineRecord<'_>> {
    let (call_no, rest) = line.split_once(' ')?;
    // `::` also shows up in shader comments; only numbered lines are calls
    call_no.parse::<u64>().ok()?;

    let paren = rest.find('(')?;
    let function = rest[..paren].trim_end();
    if !is_identifier(function) {
        return None;
    }
    let args = &rest[paren + 1..];

    let method = function.rsplit("::").next().unwrap_or(function);
    let record = match method {
        "SetRenderState" => argument(args, "State").map(|flag| LineRecord::RenderState {
            function: Some(function),
            flag,
        }),
        "CreateQuery" => argument(args, "Type")
            .or_else(|| argument(args, "Query"))
            .map(|kind| LineRecord::QueryType {
                function: Some(function),
                kind,
            }),
        _ => None,
    };
    Some(record.unwrap_or(LineRecord::Call { function }))
}

/// Function names, optionally qualified with `Interface::`.
fn is_identifier(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// The value of the `key = value` argument, matching `key` only as a whole word.
fn argument<'a>(args: &'a str, key: &str) -> Option<&'a str> {
    let mut from = 0;
    while let Some(pos) = args[from..].find(key) {
        let start = from + pos;
        let at_boundary = args[..start]
            .chars()
            .next_back()
            .is_none_or(|c| matches!(c, '(' | '{' | ',' | ' '));
        if at_boundary && let Some(value) = args[start + key.len()..].strip_prefix(" = ") {
            let end = value.find([',', ')', '}', ' ']).unwrap_or(value.len());
            if end > 0 {
                return Some(&value[..end]);
            }
        }
        from = start + key.len();
    }
    None
}
