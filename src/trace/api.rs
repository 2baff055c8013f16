//! Graphics API variants and their detection from entry-point calls.

use serde::{Deserialize, Serialize};

use crate::error::TraceStatsError;

/// The graphics API a trace captured.
///
/// Known variants parse case-insensitively (`d3d9` is [`ApiVariant::D3D9`]);
/// anything else is kept verbatim as [`ApiVariant::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApiVariant {
    D3D8,
    D3D9,
    D3D9Ex,
    D3D10,
    D3D11,
    OpenGL,
    Egl,
    Other(String),
}

impl ApiVariant {
    pub fn as_str(&self) -> &str {
        match self {
            ApiVariant::D3D8 => "D3D8",
            ApiVariant::D3D9 => "D3D9",
            ApiVariant::D3D9Ex => "D3D9Ex",
            ApiVariant::D3D10 => "D3D10",
            ApiVariant::D3D11 => "D3D11",
            ApiVariant::OpenGL => "OpenGL",
            ApiVariant::Egl => "EGL",
            ApiVariant::Other(name) => name,
        }
    }

    fn known(name: &str) -> Option<Self> {
        let api = match name.to_ascii_lowercase().as_str() {
            "d3d8" => ApiVariant::D3D8,
            "d3d9" => ApiVariant::D3D9,
            "d3d9ex" => ApiVariant::D3D9Ex,
            "d3d10" => ApiVariant::D3D10,
            "d3d11" => ApiVariant::D3D11,
            "opengl" | "gl" => ApiVariant::OpenGL,
            "egl" => ApiVariant::Egl,
            _ => return None,
        };
        Some(api)
    }
}

impl std::fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ApiVariant {
    fn from(name: &str) -> Self {
        let name = name.trim();
        Self::known(name).unwrap_or_else(|| ApiVariant::Other(name.to_string()))
    }
}

impl From<String> for ApiVariant {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ApiVariant> for String {
    fn from(api: ApiVariant) -> Self {
        api.as_str().to_string()
    }
}

impl std::str::FromStr for ApiVariant {
    type Err = TraceStatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(TraceStatsError::InvalidArguments {
                message: "API name can't be empty".to_string(),
            });
        }
        Ok(Self::from(s))
    }
}

/// Entry-point functions in detection priority order.
///
/// `Direct3DCreate9Ex` precedes `Direct3DCreate9`: an Ex trace calls both.
pub const ENTRY_POINTS: &[&str] = &[
    "Direct3DCreate8",
    "Direct3DCreate9Ex",
    "Direct3DCreate9",
    "D3D10CreateDeviceAndSwapChain1",
    "D3D10CreateDevice1",
    "D3D10CreateDeviceAndSwapChain",
    "D3D10CreateDevice",
    "D3D10CoreCreateDevice",
    "D3D11CreateDeviceAndSwapChain",
    "D3D11CreateDevice",
    "D3D11CoreCreateDevice",
    "glXCreateContext",
    "glXCreateNewContext",
    "glXCreateContextAttribsARB",
    "wglCreateContext",
    "wglCreateContextAttribsARB",
    "CGLCreateContext",
    "eglCreateContext",
];

/// The API a known entry-point function creates.
pub fn entry_point_api(function: &str) -> Option<ApiVariant> {
    let api = match function {
        "Direct3DCreate8" => ApiVariant::D3D8,
        "Direct3DCreate9Ex" => ApiVariant::D3D9Ex,
        "Direct3DCreate9" => ApiVariant::D3D9,
        "D3D10CreateDeviceAndSwapChain1"
        | "D3D10CreateDevice1"
        | "D3D10CreateDeviceAndSwapChain"
        | "D3D10CreateDevice"
        | "D3D10CoreCreateDevice" => ApiVariant::D3D10,
        "D3D11CreateDeviceAndSwapChain" | "D3D11CreateDevice" | "D3D11CoreCreateDevice" => {
            ApiVariant::D3D11
        }
        "glXCreateContext"
        | "glXCreateNewContext"
        | "glXCreateContextAttribsARB"
        | "wglCreateContext"
        | "wglCreateContextAttribsARB"
        | "CGLCreateContext" => ApiVariant::OpenGL,
        "eglCreateContext" => ApiVariant::Egl,
        _ => return None,
    };
    Some(api)
}

/// Detect a trace's API from the functions it calls.
///
/// When several entry points occur, the one earliest in [`ENTRY_POINTS`]
/// wins, regardless of the order the calls appear in.
pub fn detect_api<'a>(functions: impl IntoIterator<Item = &'a str>) -> Option<ApiVariant> {
    functions
        .into_iter()
        .filter_map(|function| ENTRY_POINTS.iter().position(|entry| *entry == function))
        .min()
        .and_then(|index| entry_point_api(ENTRY_POINTS[index]))
}
