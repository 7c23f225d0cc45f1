//! Host hardware profiling and encoder recommendation.
//!
//! `profile()` never fails: every sub-query degrades independently to an
//! "unavailable" marker, the software encoder, or the 1080p canvas default.

use std::process::Command;
use std::thread;

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

/// Marker used in textual fields when a hardware query failed.
const UNAVAILABLE: &str = "unavailable";

/// Default canvas when the primary display can't be queried.
const DEFAULT_RESOLUTION: (u32, u32) = (1920, 1080);

/// Adapter name fragments that identify virtual / remote-desktop GPUs.
/// Matched case-insensitively as substrings.
const VIRTUAL_ADAPTER_DENYLIST: &[&str] =
    &["idd", "remote", "basic", "microsoft", "gameviewer", "virtual"];

/// Video compression backend selectable in OBS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    SoftwareX264,
    Nvenc,
    AmdAmf,
    Qsv,
}

impl EncoderKind {
    /// The simple-output encoder identifier OBS uses for this backend.
    pub fn obs_id(&self) -> &'static str {
        match self {
            EncoderKind::SoftwareX264 => "obs_x264",
            EncoderKind::Nvenc => "jim_nvenc",
            EncoderKind::AmdAmf => "amd_amf_h264",
            EncoderKind::Qsv => "obs_qsv11",
        }
    }

    /// Reverse mapping from an OBS encoder identifier. Unknown identifiers
    /// yield `None`; callers fall back to [`EncoderKind::SoftwareX264`]
    /// rather than failing, since an unrecognized hardware encoder should
    /// never block configuration.
    pub fn from_obs_id(id: &str) -> Option<Self> {
        match id {
            "obs_x264" => Some(EncoderKind::SoftwareX264),
            "jim_nvenc" | "obs_nvenc_h264_tex" | "ffmpeg_nvenc" => Some(EncoderKind::Nvenc),
            "amd_amf_h264" | "h264_texture_amf" => Some(EncoderKind::AmdAmf),
            "obs_qsv11" | "obs_qsv11_v2" => Some(EncoderKind::Qsv),
            _ => None,
        }
    }
}

/// Immutable hardware snapshot, recomputed on each request.
#[derive(Debug, Clone, Serialize)]
pub struct HardwareProfile {
    pub cpu: String,
    pub memory: String,
    pub gpu: String,
    pub encoder: EncoderKind,
    pub resolution: (u32, u32),
}

/// Query the host hardware and derive an encoder recommendation.
///
/// The CPU/memory, GPU, and display queries run on their own threads and
/// are all joined before returning; one failing probe still leaves the
/// others populated.
pub fn profile() -> HardwareProfile {
    let cpu_mem = thread::spawn(query_cpu_memory);
    let gpus = thread::spawn(query_gpu_names);
    let display = thread::spawn(query_primary_resolution);

    let (cpu, memory) = cpu_mem
        .join()
        .unwrap_or_else(|_| (UNAVAILABLE.to_string(), UNAVAILABLE.to_string()));
    let gpu_names = gpus.join().unwrap_or_default();
    let resolution = display.join().ok().flatten().unwrap_or(DEFAULT_RESOLUTION);

    let gpu = select_gpu(&gpu_names).unwrap_or_else(|| UNAVAILABLE.to_string());
    let encoder = recommend_encoder(&gpu);

    debug!(%cpu, %gpu, ?resolution, encoder = encoder.obs_id(), "hardware profile");

    HardwareProfile {
        cpu,
        memory,
        gpu,
        encoder,
        resolution,
    }
}

fn query_cpu_memory() -> (String, String) {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| UNAVAILABLE.to_string());

    let total = sys.total_memory();
    let memory = if total > 0 {
        format!("{:.1} GB", total as f64 / (1024.0 * 1024.0 * 1024.0))
    } else {
        UNAVAILABLE.to_string()
    };

    (cpu, memory)
}

fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Enumerate GPU adapter names via the platform's device listing tool.
fn query_gpu_names() -> Vec<String> {
    match std::env::consts::OS {
        "windows" => {
            let out = command_stdout("wmic", &["path", "win32_VideoController", "get", "name"])
                .unwrap_or_default();
            out.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("name"))
                .map(str::to_string)
                .collect()
        }
        "macos" => {
            let out = command_stdout("system_profiler", &["SPDisplaysDataType"]).unwrap_or_default();
            out.lines()
                .filter_map(|l| l.trim().strip_prefix("Chipset Model:"))
                .map(|l| l.trim().to_string())
                .collect()
        }
        _ => {
            let out = command_stdout("lspci", &[]).unwrap_or_default();
            out.lines()
                .filter(|l| {
                    let lower = l.to_lowercase();
                    lower.contains("vga") || lower.contains("3d") || lower.contains("display")
                })
                .filter_map(|l| l.splitn(2, ": ").nth(1))
                .map(str::to_string)
                .collect()
        }
    }
}

/// Primary display dimensions, `None` when they can't be determined or are
/// not both positive.
fn query_primary_resolution() -> Option<(u32, u32)> {
    let (w, h) = match std::env::consts::OS {
        "windows" => {
            let out = command_stdout(
                "wmic",
                &[
                    "path",
                    "Win32_VideoController",
                    "get",
                    "CurrentHorizontalResolution,CurrentVerticalResolution",
                ],
            )?;
            let nums: Vec<u32> = out
                .split_whitespace()
                .filter_map(|t| t.parse().ok())
                .collect();
            (*nums.first()?, *nums.get(1)?)
        }
        "macos" => {
            let out = command_stdout("system_profiler", &["SPDisplaysDataType"])?;
            let line = out
                .lines()
                .find(|l| l.trim().starts_with("Resolution:"))?
                .trim();
            parse_resolution(line)?
        }
        _ => {
            let out = command_stdout("xrandr", &["--current"])?;
            let line = out
                .lines()
                .find(|l| l.contains(" connected primary"))
                .or_else(|| out.lines().find(|l| l.contains(" connected")))?;
            parse_resolution(line)?
        }
    };

    if w > 0 && h > 0 {
        Some((w, h))
    } else {
        None
    }
}

/// Pull the first `<width>x<height>` pair out of a tool's output line.
/// Handles both the joined `2560x1440` form (xrandr) and the spaced
/// `3456 x 2234` form (system_profiler).
fn parse_resolution(line: &str) -> Option<(u32, u32)> {
    let cleaned: String = line
        .chars()
        .map(|c| if c.is_ascii_digit() || c == 'x' { c } else { ' ' })
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if let Some((w, h)) = token.split_once('x') {
            if let (Ok(w), Ok(h)) = (w.parse(), h.parse()) {
                return Some((w, h));
            }
        }
        if *token == "x" && i > 0 && i + 1 < tokens.len() {
            if let (Ok(w), Ok(h)) = (tokens[i - 1].parse(), tokens[i + 1].parse()) {
                return Some((w, h));
            }
        }
    }
    None
}

fn is_virtual_adapter(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_ADAPTER_DENYLIST
        .iter()
        .any(|pat| lower.contains(pat))
}

/// Pick the adapter used for the encoder recommendation: virtual adapters
/// are excluded, then NVIDIA > AMD/Radeon > Intel > first remaining, with
/// enumeration order breaking ties.
pub fn select_gpu(names: &[String]) -> Option<String> {
    let candidates: Vec<&String> = names.iter().filter(|n| !is_virtual_adapter(n)).collect();

    for tier in [
        &["nvidia"][..],
        &["amd", "radeon"][..],
        &["intel"][..],
    ] {
        if let Some(found) = candidates.iter().find(|n| {
            let lower = n.to_lowercase();
            tier.iter().any(|v| lower.contains(v))
        }) {
            return Some((*found).clone());
        }
    }

    candidates.first().map(|n| (*n).clone())
}

/// Encoder tier for a GPU name; software x264 when nothing matches.
pub fn recommend_encoder(gpu_name: &str) -> EncoderKind {
    let lower = gpu_name.to_lowercase();
    if lower.contains("nvidia") {
        EncoderKind::Nvenc
    } else if lower.contains("amd") || lower.contains("radeon") {
        EncoderKind::AmdAmf
    } else if lower.contains("intel") {
        EncoderKind::Qsv
    } else {
        EncoderKind::SoftwareX264
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn virtual_adapters_are_excluded() {
        let gpus = names(&[
            "Microsoft Basic Render Driver",
            "Parsec Virtual Display Adapter",
            "IddSampleDriver Device",
            "NVIDIA GeForce RTX 3060",
        ]);
        assert_eq!(select_gpu(&gpus).as_deref(), Some("NVIDIA GeForce RTX 3060"));
    }

    #[test]
    fn all_virtual_yields_none() {
        let gpus = names(&["Microsoft Remote Display Adapter", "Virtual GPU"]);
        assert_eq!(select_gpu(&gpus), None);
    }

    #[test]
    fn vendor_priority_overrides_list_order() {
        let gpus = names(&[
            "Intel(R) UHD Graphics 770",
            "NVIDIA GeForce RTX 4070",
            "AMD Radeon RX 7800 XT",
        ]);
        assert_eq!(select_gpu(&gpus).as_deref(), Some("NVIDIA GeForce RTX 4070"));
    }

    #[test]
    fn amd_beats_intel() {
        let gpus = names(&["Intel(R) Arc A770", "AMD Radeon RX 6600"]);
        assert_eq!(select_gpu(&gpus).as_deref(), Some("AMD Radeon RX 6600"));
    }

    #[test]
    fn unknown_vendor_falls_back_to_first_remaining() {
        let gpus = names(&["Moore Threads MTT S80", "Another Oddball GPU"]);
        assert_eq!(select_gpu(&gpus).as_deref(), Some("Moore Threads MTT S80"));
    }

    #[test]
    fn encoder_follows_vendor_tiers() {
        assert_eq!(recommend_encoder("NVIDIA GeForce RTX 3060"), EncoderKind::Nvenc);
        assert_eq!(recommend_encoder("AMD Radeon RX 6600"), EncoderKind::AmdAmf);
        assert_eq!(recommend_encoder("Intel(R) UHD Graphics 630"), EncoderKind::Qsv);
        assert_eq!(recommend_encoder("unavailable"), EncoderKind::SoftwareX264);
    }

    #[test]
    fn obs_id_round_trip() {
        for kind in [
            EncoderKind::SoftwareX264,
            EncoderKind::Nvenc,
            EncoderKind::AmdAmf,
            EncoderKind::Qsv,
        ] {
            assert_eq!(EncoderKind::from_obs_id(kind.obs_id()), Some(kind));
        }
        assert_eq!(EncoderKind::from_obs_id("unknown_xyz"), None);
    }

    #[test]
    fn parse_resolution_variants() {
        assert_eq!(
            parse_resolution("eDP-1 connected primary 2560x1440+0+0 (normal left) 344mm x 194mm"),
            Some((2560, 1440))
        );
        assert_eq!(
            parse_resolution("Resolution: 3456 x 2234 Retina"),
            Some((3456, 2234))
        );
        assert_eq!(parse_resolution("no numbers here"), None);
    }

    #[test]
    fn profile_never_panics_and_has_defaults() {
        let p = profile();
        assert!(!p.cpu.is_empty());
        assert!(p.resolution.0 > 0 && p.resolution.1 > 0);
    }
}
