//! # Test utilities for tracestats
//!
//! `TestEnv` owns a temporary directory holding fixture traces, a mock
//! `apitrace`, a store file and an (absent) config file. Commands built by
//! [`TestEnv::command`] run inside that directory with every `TRACESTATS_*`
//! variable from the outer environment removed, so tests never read or write
//! the user's config or store.
//!
//! ## Mock apitrace
//!
//! A POSIX shell script standing in for `apitrace`:
//! - `version` prints `apitrace $MOCK_APITRACE_VERSION` (default `12.0`)
//! - `dump --calls=A-B TRACE` prints lines `A+1..=B+1` of the fixture, so
//!   line `i + 1` of a fixture is call `i`
//! - `dump --blobs TRACE` writes one `blob_N.bin` per shader creation call
//!   into its working directory
//! - any dump of a fixture whose first line is `#fail` exits with status 3

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use insta_cmd::get_cargo_bin;
use tempfile::TempDir;

const MOCK_APITRACE: &str = r#"#!/bin/sh
case "$1" in
  version) echo "apitrace ${MOCK_APITRACE_VERSION:-12.0}"; exit 0 ;;
  dump) shift ;;
  *) echo "unknown command: $1" >&2; exit 2 ;;
esac
calls=""
blobs=""
trace=""
for arg in "$@"; do
  case "$arg" in
    --calls=*) calls="${arg#--calls=}" ;;
    --blobs) blobs=1 ;;
    *) trace="$arg" ;;
  esac
done
if head -n 1 "$trace" | grep -q '^#fail'; then
  echo "error: corrupt trace" >&2
  exit 3
fi
if [ -n "$blobs" ]; then
  n=$(grep -c -E 'Create(Pixel|Vertex)Shader' "$trace")
  i=0
  while [ "$i" -lt "$n" ]; do
    i=$((i + 1))
    echo blob > "blob_$i.bin"
  done
  exit 0
fi
start="${calls%-*}"
end="${calls#*-}"
awk -v s="$start" -v e="$end" 'NR - 1 >= s + 0 && NR - 1 <= e + 0' "$trace"
"#;

/// A short D3D9 capture: 9 calls, 2 render states, 1 query, 1 shader.
pub const D3D9_TRACE: &str = "\
0 Direct3DCreate9(SDKVersion = 32) = 0x00c4e2a0
1 IDirect3D9::CreateDevice(this = 0x00c4e2a0, Adapter = 0) = D3D_OK
2 IDirect3DDevice9::SetRenderState(this = 0x00c4f3c0, State = D3DRS_ZENABLE, Value = 1) = D3D_OK
3 IDirect3DDevice9::SetRenderState(this = 0x00c4f3c0, State = D3DRS_LIGHTING, Value = 0) = D3D_OK
4 IDirect3DDevice9::CreatePixelShader(this = 0x00c4f3c0, pFunction = blob(232)) = D3D_OK
5 IDirect3DDevice9::CreateQuery(this = 0x00c4f3c0, Type = D3DQUERYTYPE_EVENT, ppQuery = &0x0) = D3D_OK
6 IDirect3DDevice9::Clear(this = 0x00c4f3c0, Count = 0) = D3D_OK
7 IDirect3DDevice9::Clear(this = 0x00c4f3c0, Count = 0) = D3D_OK
8 IDirect3DDevice9::Present(this = 0x00c4f3c0) = D3D_OK
";

/// An OpenGL capture: one context creation, glDrawArrays twice, glClear once.
pub const GL_TRACE: &str = "\
0 glXCreateContextAttribsARB(dpy = 0x1, config = 0x2) = 0x3
1 glDrawArrays(mode = GL_TRIANGLES, first = 0, count = 3)
2 glDrawArrays(mode = GL_TRIANGLES, first = 3, count = 3)
3 glClear(mask = GL_COLOR_BUFFER_BIT)
";

pub struct TestEnv {
    _temp_dir: TempDir, // Must keep to ensure cleanup on drop
    root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        // Canonicalize to resolve symlinks (macOS /var -> /private/var)
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp path");
        let env = Self {
            _temp_dir: temp_dir,
            root,
        };
        env.write_executable("bin/apitrace", MOCK_APITRACE);
        env
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn apitrace(&self) -> PathBuf {
        self.root.join("bin/apitrace")
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join("store.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config/config.toml")
    }

    /// Write a fixture file relative to the test root.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.root.join(name))
            .unwrap_or_else(|_| panic!("Failed to read {name}"))
    }

    fn write_executable(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.write(name, contents);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("Failed to make mock executable");
        }
        path
    }

    /// A `tracestats` command isolated from the user's environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(get_cargo_bin("tracestats"));
        for (key, _) in std::env::vars() {
            if key.starts_with("TRACESTATS_") || key == "RUST_LOG" {
                cmd.env_remove(&key);
            }
        }
        cmd.env_remove("CLICOLOR_FORCE")
            .env("NO_COLOR", "1")
            .env("TRACESTATS_CONFIG_PATH", self.config_path())
            .env("XDG_DATA_HOME", self.root.join("data"))
            .env("HOME", &self.root)
            .current_dir(&self.root);
        cmd
    }

    /// `tracestats parse` with the mock tool.
    pub fn parse(&self, args: &[&str]) -> Output {
        let mut cmd = self.command();
        cmd.arg("parse").arg("-a").arg(self.apitrace()).args(args);
        cmd.output().expect("Failed to run tracestats")
    }

    /// A store subcommand against this environment's store file.
    pub fn store_cmd(&self, subcommand: &str, args: &[&str]) -> Output {
        let mut cmd = self.command();
        cmd.arg(subcommand)
            .args(args)
            .arg("--store")
            .arg(self.store_path());
        cmd.output().expect("Failed to run tracestats")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
