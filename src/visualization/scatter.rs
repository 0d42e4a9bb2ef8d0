//! Self-contained HTML rendering of the per-packet 3D scatter plot.
//!
//! The page carries its data as embedded JSON and draws it on a `<canvas>`
//! with a small inline script, so it opens without network access.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::analysis::PacketTable;

pub const SCATTER_TITLE: &str = "3D Scatter Plot of Network Traffic";
pub const UNKNOWN_SOURCE: &str = "(unknown)";

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize chart data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to launch browser '{command}': {source}")]
    BrowserLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Browser command '{command}' exited with {status}")]
    BrowserExit { command: String, status: ExitStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    /// Milliseconds since the Unix epoch.
    pub t: i64,
    pub time: String,
    /// Index into `ScatterData::sources`.
    pub s: usize,
    pub len: u64,
    /// Index into `ScatterData::protocols`.
    pub p: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScatterData {
    pub title: String,
    pub sources: Vec<String>,
    pub protocols: Vec<String>,
    pub protocol_counts: Vec<u64>,
    pub time_min_ms: i64,
    pub time_max_ms: i64,
    pub length_min: u64,
    pub length_max: u64,
    pub points: Vec<ScatterPoint>,
}

/// Assigns category indices in order of first appearance.
#[derive(Default)]
struct Categories {
    index: HashMap<String, usize>,
    names: Vec<String>,
}

impl Categories {
    fn index_of(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.index.insert(name.to_string(), i);
        self.names.push(name.to_string());
        i
    }
}

impl ScatterData {
    pub fn from_table(table: &PacketTable) -> Self {
        let mut sources = Categories::default();
        let mut protocols = Categories::default();
        let mut protocol_counts: Vec<u64> = Vec::new();

        let points: Vec<ScatterPoint> = table
            .rows()
            .iter()
            .map(|row| {
                let p = protocols.index_of(&row.record.protocol);
                if p == protocol_counts.len() {
                    protocol_counts.push(0);
                }
                protocol_counts[p] += 1;

                ScatterPoint {
                    t: row.timestamp.timestamp_millis(),
                    time: row.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                    s: sources.index_of(row.record.source.as_deref().unwrap_or(UNKNOWN_SOURCE)),
                    len: row.record.length,
                    p,
                }
            })
            .collect();

        Self {
            title: SCATTER_TITLE.to_string(),
            sources: sources.names,
            protocols: protocols.names,
            protocol_counts,
            time_min_ms: points.iter().map(|p| p.t).min().unwrap_or(0),
            time_max_ms: points.iter().map(|p| p.t).max().unwrap_or(0),
            length_min: points.iter().map(|p| p.len).min().unwrap_or(0),
            length_max: points.iter().map(|p| p.len).max().unwrap_or(0),
            points,
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_html(data: &ScatterData) -> Result<String, PresentError> {
    // "</" inside a string literal would close the script element
    let json = serde_json::to_string(data)?.replace("</", "<\\/");
    Ok(HTML_TEMPLATE
        .replace("__TITLE__", &escape_html(&data.title))
        .replace("__DATA__", &json))
}

pub fn write_html(path: &Path, html: &str) -> Result<(), PresentError> {
    fs::write(path, html).map_err(|source| PresentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    info!("Wrote {} ({} bytes)", path.display(), html.len());
    Ok(())
}

/// How the page gets handed to a browser.
#[derive(Debug, Clone, PartialEq)]
struct BrowserCommand {
    program: String,
    args: Vec<OsString>,
    /// System launchers return quickly; a browser named in `$BROWSER` keeps running.
    wait: bool,
}

fn browser_command(target: &Path, browser_env: Option<OsString>) -> BrowserCommand {
    if let Some(browser) = browser_env.filter(|b| !b.is_empty()) {
        return BrowserCommand {
            program: browser.to_string_lossy().into_owned(),
            args: vec![target.into()],
            wait: false,
        };
    }

    let (program, args): (&str, Vec<OsString>) = if cfg!(target_os = "macos") {
        ("open", vec![target.into()])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C".into(), "start".into(), "".into(), target.into()])
    } else {
        ("xdg-open", vec![target.into()])
    };
    BrowserCommand {
        program: program.to_string(),
        args,
        wait: true,
    }
}

fn launch(browser: BrowserCommand) -> Result<(), PresentError> {
    let mut command = Command::new(&browser.program);
    command.args(&browser.args);

    if !browser.wait {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PresentError::BrowserLaunch {
                command: browser.program.clone(),
                source,
            })?;
        return Ok(());
    }

    let status = command.status().map_err(|source| PresentError::BrowserLaunch {
        command: browser.program.clone(),
        source,
    })?;
    if !status.success() {
        return Err(PresentError::BrowserExit {
            command: browser.program,
            status,
        });
    }
    Ok(())
}

/// Opens a file in the web browser named by `$BROWSER`, or the system default.
///
/// The system launcher is waited on so its exit status can be checked; a
/// browser from `$BROWSER` is started in the background.
pub fn open_in_browser(path: &Path) -> Result<(), PresentError> {
    let target = fs::canonicalize(path).map_err(|source| PresentError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let browser = browser_command(&target, std::env::var_os("BROWSER"));
    debug!("Opening {} with {}", target.display(), browser.program);
    launch(browser)
}

const HTML_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<style>
  body { margin: 0; font-family: "Segoe UI", Helvetica, Arial, sans-serif; color: #2a3f5f; background: #fff; }
  header { padding: 10px 16px 0 16px; height: 56px; box-sizing: border-box; }
  h1 { font-size: 18px; margin: 0 0 4px 0; font-weight: 500; }
  #summary { font-size: 13px; color: #667; }
  #wrap { position: relative; }
  canvas { display: block; cursor: grab; }
  canvas.dragging { cursor: grabbing; }
  #legend { position: absolute; top: 8px; right: 16px; background: rgba(255, 255, 255, 0.9);
            border: 1px solid #dde; padding: 6px 10px; font-size: 13px; line-height: 20px; }
  #legend .swatch { display: inline-block; width: 10px; height: 10px; margin-right: 6px; border-radius: 50%; }
  #tooltip { position: absolute; pointer-events: none; background: rgba(42, 63, 95, 0.92); color: #fff;
             padding: 4px 8px; font-size: 12px; border-radius: 3px; display: none; white-space: pre; }
</style>
</head>
<body>
<header><h1>__TITLE__</h1><div id="summary"></div></header>
<div id="wrap"><canvas id="plot"></canvas><div id="legend"></div><div id="tooltip"></div></div>
<script>
const DATA = __DATA__;
const COLORS = ["#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a",
                "#19d3f3", "#ff6692", "#b6e880", "#ff97ff", "#fecb52"];
const HEADER = 56;

const canvas = document.getElementById("plot");
const ctx = canvas.getContext("2d");
const tooltip = document.getElementById("tooltip");

let yaw = -0.65, pitch = 0.35, zoom = 1.0;
let dragging = false, lastX = 0, lastY = 0;
let projected = [];

function norm(v, lo, hi) { return hi > lo ? (v - lo) / (hi - lo) * 2 - 1 : 0; }
function color(i) { return COLORS[i % COLORS.length]; }
function fmtTime(ms) { return new Date(ms).toISOString().replace("T", " ").slice(0, 19); }

const points = DATA.points.map(p => ({
  x: norm(p.t, DATA.time_min_ms, DATA.time_max_ms),
  y: norm(p.s, 0, DATA.sources.length - 1),
  z: norm(p.len, DATA.length_min, DATA.length_max),
  src: p
}));

// x = time, y = source (depth), z = length (up)
function project(x, y, z) {
  const w = canvas.clientWidth, h = canvas.clientHeight;
  const rx = x * Math.cos(yaw) - y * Math.sin(yaw);
  const ry = x * Math.sin(yaw) + y * Math.cos(yaw);
  const up = z * Math.cos(pitch) + ry * Math.sin(pitch);
  const depth = ry * Math.cos(pitch) - z * Math.sin(pitch);
  const f = 3.5 / (3.5 + depth);
  const scale = Math.min(w, h) * 0.3 * zoom;
  return { px: w / 2 + rx * scale * f, py: h / 2 - up * scale * f, depth: depth, f: f };
}

function line(a, b) {
  const p = project(a[0], a[1], a[2]), q = project(b[0], b[1], b[2]);
  ctx.beginPath();
  ctx.moveTo(p.px, p.py);
  ctx.lineTo(q.px, q.py);
  ctx.stroke();
}

function label(text, x, y, z, align) {
  const p = project(x, y, z);
  ctx.textAlign = align || "center";
  ctx.fillText(text, p.px, p.py);
}

function drawFrame() {
  ctx.strokeStyle = "#d5dbe5";
  ctx.lineWidth = 1;
  for (const a of [-1, 1]) {
    for (const b of [-1, 1]) {
      line([-1, a, b], [1, a, b]);
      line([a, -1, b], [a, 1, b]);
      line([a, b, -1], [a, b, 1]);
    }
  }

  ctx.fillStyle = "#2a3f5f";
  ctx.font = "bold 12px sans-serif";
  label("timestamp", 0, -1.25, -1.15);
  label("source", -1.3, 0, -1.15);
  label("length", -1.2, -1.2, 0, "right");

  ctx.font = "11px sans-serif";
  ctx.fillStyle = "#556";
  if (DATA.points.length > 0) {
    label(fmtTime(DATA.time_min_ms), -1, -1.1, -1.1);
    label(fmtTime(DATA.time_max_ms), 1, -1.1, -1.1);
    label(String(DATA.length_min), -1.1, -1.1, -1, "right");
    label(String(DATA.length_max), -1.1, -1.1, 1, "right");
    const n = DATA.sources.length;
    const step = Math.max(1, Math.ceil(n / 10));
    for (let i = 0; i < n; i += step) {
      label(DATA.sources[i], -1.12, norm(i, 0, n - 1), -1.05, "right");
    }
  }
}

function draw() {
  const w = canvas.clientWidth, h = canvas.clientHeight;
  ctx.clearRect(0, 0, w, h);
  drawFrame();

  if (points.length === 0) {
    ctx.fillStyle = "#889";
    ctx.font = "16px sans-serif";
    ctx.textAlign = "center";
    ctx.fillText("No packets to display", w / 2, h / 2);
    projected = [];
    return;
  }

  projected = points.map(p => Object.assign(project(p.x, p.y, p.z), { src: p.src }));
  const order = projected.slice().sort((a, b) => b.depth - a.depth);
  ctx.globalAlpha = 0.8;
  for (const p of order) {
    ctx.fillStyle = color(p.src.p);
    ctx.beginPath();
    ctx.arc(p.px, p.py, Math.max(1.5, 3.5 * p.f), 0, 2 * Math.PI);
    ctx.fill();
  }
  ctx.globalAlpha = 1.0;
}

function resize() {
  const ratio = window.devicePixelRatio || 1;
  const w = window.innerWidth, h = Math.max(200, window.innerHeight - HEADER);
  canvas.width = w * ratio;
  canvas.height = h * ratio;
  canvas.style.width = w + "px";
  canvas.style.height = h + "px";
  ctx.setTransform(ratio, 0, 0, ratio, 0, 0);
  draw();
}

function nearest(mx, my) {
  let best = null, bestDist = 36;
  for (const p of projected) {
    const d = (p.px - mx) * (p.px - mx) + (p.py - my) * (p.py - my);
    if (d < bestDist) { best = p; bestDist = d; }
  }
  return best;
}

canvas.addEventListener("mousedown", e => {
  dragging = true; lastX = e.clientX; lastY = e.clientY;
  canvas.classList.add("dragging");
  tooltip.style.display = "none";
});
window.addEventListener("mouseup", () => { dragging = false; canvas.classList.remove("dragging"); });
canvas.addEventListener("mousemove", e => {
  if (dragging) {
    yaw += (e.clientX - lastX) * 0.01;
    pitch = Math.max(-1.5, Math.min(1.5, pitch + (e.clientY - lastY) * 0.01));
    lastX = e.clientX; lastY = e.clientY;
    draw();
    return;
  }
  const rect = canvas.getBoundingClientRect();
  const hit = nearest(e.clientX - rect.left, e.clientY - rect.top);
  if (!hit) { tooltip.style.display = "none"; return; }
  const p = hit.src;
  tooltip.textContent = "timestamp: " + p.time + "\nsource: " + DATA.sources[p.s] +
    "\nlength: " + p.len + "\nprotocol: " + DATA.protocols[p.p];
  tooltip.style.left = (e.clientX - rect.left + 12) + "px";
  tooltip.style.top = (e.clientY - rect.top + 12) + "px";
  tooltip.style.display = "block";
});
canvas.addEventListener("mouseleave", () => { tooltip.style.display = "none"; });
canvas.addEventListener("wheel", e => {
  e.preventDefault();
  zoom = Math.max(0.3, Math.min(5, zoom * Math.exp(-e.deltaY * 0.001)));
  draw();
}, { passive: false });

const legend = document.getElementById("legend");
if (DATA.protocols.length === 0) {
  legend.style.display = "none";
}
DATA.protocols.forEach((name, i) => {
  const row = document.createElement("div");
  const swatch = document.createElement("span");
  swatch.className = "swatch";
  swatch.style.background = color(i);
  row.appendChild(swatch);
  row.appendChild(document.createTextNode(name + " (" + DATA.protocol_counts[i] + ")"));
  legend.appendChild(row);
});

document.getElementById("summary").textContent = DATA.points.length === 0
  ? "0 packets"
  : DATA.points.length + " packets from " + DATA.sources.length + " sources, " +
    fmtTime(DATA.time_min_ms) + " to " + fmtTime(DATA.time_max_ms) + " UTC. Drag to rotate, scroll to zoom.";

window.addEventListener("resize", resize);
resize();
</script>
</body>
</html>
"##;
