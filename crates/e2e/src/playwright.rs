//! Playwright browser automation
//!
//! A long-lived Node.js bridge process owns the browser. Commands and replies
//! travel as line-delimited JSON over the bridge's stdin/stdout, one command
//! in flight at a time.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use compare_qa_common::ProjectConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{
    bottom_cluster, BestEffortWait, Interaction, PageAutomation, VisibleAffordance, WaitOutcome,
    BOTTOM_BAND_PX,
};

/// How long the send control may take to become enabled
const SEND_ENABLED_TIMEOUT_MS: u64 = 5000;

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const pw = require('playwright');

let browser = null;
let context = null;
let page = null;

const EDITABLE = ['textarea', 'input[type="text"]', '[contenteditable="true"]', 'div[role="textbox"]'];
const SEND_BUTTON = "button[aria-label='Send message']";
const PROCESSING_TEXT = 'Please wait while I process';

async function labelOf(el, preferValue) {
  const primary = preferValue
    ? ((await el.getAttribute('value')) || '').trim()
    : ((await el.innerText()) || '').trim();
  if (primary) return primary;
  return ((await el.getAttribute('aria-label')) || '').trim()
    || ((await el.getAttribute('title')) || '').trim();
}

async function collect() {
  const items = [];
  const push = async (loc, preferValue) => {
    const n = await loc.count();
    for (let i = 0; i < n; i++) {
      const el = loc.nth(i);
      try {
        if (!(await el.isVisible())) continue;
        const label = await labelOf(el, preferValue);
        const box = await el.boundingBox();
        if (label && box) items.push({ label, y: box.y + box.height / 2 });
      } catch (e) { /* detached while reading */ }
    }
  };
  await push(page.getByRole('button'), false);
  await push(page.getByRole('link'), false);
  await push(page.locator("input[type='submit'], input[type='button']"), true);
  await push(page.locator('label'), false);
  return items;
}

async function click(label, exact) {
  const byRole = page.getByRole('button', { name: label, exact });
  if (await byRole.count()) {
    await byRole.first().click();
    return true;
  }
  const loc = page.getByText(label, { exact }).first();
  if (!(await loc.count())) return false;
  try { await loc.scrollIntoViewIfNeeded(); } catch (e) { /* best effort */ }
  try {
    await loc.click();
  } catch (e) {
    await loc.evaluate((el) => el.click());
  }
  return true;
}

async function sendEnabled(btn, timeout) {
  const deadline = Date.now() + timeout;
  try { await btn.waitFor({ state: 'visible', timeout: Math.min(timeout, 2000) }); } catch (e) { /* keep polling */ }
  while (Date.now() < deadline) {
    try {
      if ((await btn.count()) && (await btn.isEnabled())) return true;
    } catch (e) { /* keep polling */ }
    await page.waitForTimeout(100);
  }
  return false;
}

async function send(text, enabledTimeout) {
  let focused = false;
  for (const sel of EDITABLE) {
    const loc = page.locator(sel).first();
    if (!(await loc.count())) continue;
    try {
      await loc.click();
      try {
        await loc.fill('');
        await loc.pressSequentially(text);
      } catch (e) {
        await page.keyboard.type(text);
      }
      focused = true;
      break;
    } catch (e) {
      continue;
    }
  }
  if (!focused) return 'not_found';

  const btn = page.locator(SEND_BUTTON).first();
  if (await btn.count()) {
    if (!(await sendEnabled(btn, enabledTimeout))) return 'send control stayed disabled';
    try {
      await btn.click();
    } catch (e) {
      await page.keyboard.press('Enter');
    }
    return 'sent';
  }
  await page.keyboard.press('Enter');
  return 'sent';
}

async function handle(cmd) {
  switch (cmd.op) {
    case 'launch': {
      const engine = pw[cmd.browser];
      if (!engine) throw new Error('unknown browser ' + cmd.browser);
      browser = await engine.launch({ headless: cmd.headless, slowMo: cmd.slowMo });
      context = await browser.newContext({ viewport: cmd.viewport });
      page = await context.newPage();
      return {};
    }
    case 'goto':
      await page.goto(cmd.url, { waitUntil: 'domcontentloaded' });
      return {};
    case 'networkIdle':
      try {
        await page.waitForLoadState('networkidle', { timeout: cmd.timeout });
        return { ready: true };
      } catch (e) {
        return { ready: false };
      }
    case 'processingDone': {
      const loc = page.getByText(PROCESSING_TEXT, { exact: false });
      if (!(await loc.count())) return { ready: false };
      try {
        await loc.first().waitFor({ state: 'hidden', timeout: cmd.timeout });
        return { ready: true };
      } catch (e) {
        return { ready: false };
      }
    }
    case 'collect':
      return { items: await collect() };
    case 'click':
      return { clicked: await click(cmd.label, cmd.exact) };
    case 'send':
      return { status: await send(cmd.text, cmd.enabledTimeout) };
    case 'readText': {
      const loc = page.locator(cmd.selector);
      const n = await loc.count();
      if (!n) return { text: null };
      return { text: ((await loc.nth(n - 1).innerText()) || '').trim() };
    }
    case 'screenshot':
      await page.screenshot({ path: cmd.path });
      return { path: cmd.path };
    case 'scroll':
      await page.mouse.wheel(0, cmd.pixels);
      await page.waitForTimeout(200);
      return {};
    case 'close':
      try {
        if (context) await context.close();
        if (browser) await browser.close();
      } finally {
        context = null;
        browser = null;
        page = null;
      }
      return {};
    default:
      throw new Error('unknown op ' + cmd.op);
  }
}

const rl = readline.createInterface({ input: process.stdin });
let chain = Promise.resolve();
rl.on('line', (line) => {
  chain = chain.then(async () => {
    let cmd;
    try { cmd = JSON.parse(line); } catch (e) { return; }
    let reply;
    try {
      reply = { id: cmd.id, ok: true, result: await handle(cmd) };
    } catch (e) {
      reply = { id: cmd.id, ok: false, error: String((e && e.message) || e) };
    }
    if (cmd.op === 'close') {
      process.stdout.write(JSON.stringify(reply) + '\n', () => process.exit(0));
    } else {
      process.stdout.write(JSON.stringify(reply) + '\n');
    }
  });
});
rl.on('close', async () => {
  try { if (browser) await browser.close(); } catch (e) { /* exiting anyway */ }
  process.exit(0);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::BrowserLaunch(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub slow_mo_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub screenshot_dir: PathBuf,
    /// Node.js executable running the bridge
    pub node_binary: PathBuf,
    /// Upper bound on a single bridge round trip
    pub command_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            slow_mo_ms: 100,
            viewport_width: 1280,
            viewport_height: 720,
            screenshot_dir: PathBuf::from("files/shots"),
            node_binary: PathBuf::from("node"),
            command_timeout: Duration::from_secs(60),
        }
    }
}

impl PlaywrightConfig {
    pub fn from_project(config: &ProjectConfig) -> E2eResult<Self> {
        Ok(Self {
            browser: config.ui.browser.parse()?,
            headless: config.ui.headless,
            slow_mo_ms: config.ui.slow_mo_ms,
            viewport_width: config.ui.viewport.width,
            viewport_height: config.ui.viewport.height,
            screenshot_dir: config.artifacts.shots_dir(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl Bridge {
    async fn read_reply(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("bridge process exited".to_string()))?;
            match serde_json::from_str::<BridgeReply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!("Discarding stale bridge reply {}", reply.id),
                Err(_) => debug!("Bridge output: {}", line),
            }
        }
    }
}

/// Browser session backed by a Playwright bridge process
pub struct PlaywrightSession {
    config: PlaywrightConfig,
    bridge: Option<Bridge>,
    _script_dir: Option<TempDir>,
    shot_seq: u32,
}

impl PlaywrightSession {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self {
            config,
            bridge: None,
            _script_dir: None,
            shot_seq: 0,
        }
    }

    /// Module search path so the temp-dir bridge can `require('playwright')`
    fn node_path() -> E2eResult<std::ffi::OsString> {
        let local = std::env::current_dir()?.join("node_modules");
        let mut paths = vec![local];
        if let Some(existing) = std::env::var_os("NODE_PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths)
            .map_err(|e| E2eError::BrowserLaunch(format!("invalid NODE_PATH: {}", e)))
    }

    /// Check if Playwright is resolvable by node
    async fn check_playwright_installed(&self, node_path: &std::ffi::OsStr) -> E2eResult<()> {
        let status = TokioCommand::new(&self.config.node_binary)
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", node_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn call(&mut self, command: Value) -> E2eResult<Value> {
        let timeout = self.config.command_timeout;
        let bridge = self
            .bridge
            .as_mut()
            .ok_or_else(|| E2eError::Playwright("browser not launched".to_string()))?;

        bridge.next_id += 1;
        let id = bridge.next_id;
        let op = command["op"].as_str().unwrap_or("?").to_string();
        let mut command = command;
        command["id"] = json!(id);

        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.flush().await?;

        let reply = tokio::time::timeout(timeout, bridge.read_reply(id))
            .await
            .map_err(|_| {
                E2eError::Playwright(format!("no reply to '{}' within {:?}", op, timeout))
            })??;

        if reply.ok {
            Ok(reply.result)
        } else {
            Err(E2eError::Playwright(format!(
                "{}: {}",
                op,
                reply.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }

    async fn best_effort(&mut self, op: &str, wait: BestEffortWait) -> WaitOutcome {
        let result = self
            .call(json!({ "op": op, "timeout": wait.timeout.as_millis() as u64 }))
            .await;
        match result {
            Ok(v) if v["ready"].as_bool() == Some(true) => WaitOutcome::Ready,
            other => {
                if let Err(e) = other {
                    debug!("{} check failed: {}", op, e);
                }
                debug!(
                    "{} not reached within {:?}, falling back to {:?}",
                    op, wait.timeout, wait.fallback
                );
                tokio::time::sleep(wait.fallback).await;
                wait.timed_out()
            }
        }
    }
}

#[async_trait]
impl PageAutomation for PlaywrightSession {
    async fn launch(&mut self) -> E2eResult<()> {
        if self.bridge.is_some() {
            return Ok(());
        }

        let node_path = Self::node_path()?;
        self.check_playwright_installed(&node_path).await?;
        std::fs::create_dir_all(&self.config.screenshot_dir)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .env("NODE_PATH", &node_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::BrowserLaunch(format!(
                    "failed to spawn {}: {}",
                    self.config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::BrowserLaunch("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::BrowserLaunch("bridge stdout unavailable".to_string()))?;

        self.bridge = Some(Bridge {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        });
        self._script_dir = Some(script_dir);

        let launch = json!({
            "op": "launch",
            "browser": self.config.browser.as_str(),
            "headless": self.config.headless,
            "slowMo": self.config.slow_mo_ms,
            "viewport": {
                "width": self.config.viewport_width,
                "height": self.config.viewport_height,
            },
        });
        if let Err(e) = self.call(launch).await {
            self.close().await;
            return Err(E2eError::BrowserLaunch(e.to_string()));
        }

        info!(
            "Launched {} (headless: {})",
            self.config.browser.as_str(),
            self.config.headless
        );
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        self.call(json!({ "op": "goto", "url": url }))
            .await
            .map(|_| ())
            .map_err(|e| E2eError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_network_idle(&mut self, wait: BestEffortWait) -> WaitOutcome {
        self.best_effort("networkIdle", wait).await
    }

    async fn wait_processing_done(&mut self, wait: BestEffortWait) -> WaitOutcome {
        self.best_effort("processingDone", wait).await
    }

    async fn settle(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn list_visible_affordances(&mut self) -> Vec<VisibleAffordance> {
        let items = match self.call(json!({ "op": "collect" })).await {
            Ok(mut v) => serde_json::from_value::<Vec<VisibleAffordance>>(v["items"].take())
                .unwrap_or_default(),
            Err(e) => {
                warn!("Could not list affordances: {}", e);
                Vec::new()
            }
        };
        bottom_cluster(items, BOTTOM_BAND_PX)
    }

    async fn click_by_label(&mut self, label: &str, exact: bool) -> Interaction {
        match self
            .call(json!({ "op": "click", "label": label, "exact": exact }))
            .await
        {
            Ok(v) if v["clicked"].as_bool() == Some(true) => Interaction::Done,
            Ok(_) => Interaction::NotFound,
            Err(e) => Interaction::Failed(e.to_string()),
        }
    }

    async fn type_and_submit(&mut self, text: &str) -> Interaction {
        let command = json!({
            "op": "send",
            "text": text,
            "enabledTimeout": SEND_ENABLED_TIMEOUT_MS,
        });
        match self.call(command).await {
            Ok(v) => match v["status"].as_str() {
                Some("sent") => Interaction::Done,
                Some("not_found") => Interaction::NotFound,
                Some(other) => Interaction::Failed(other.to_string()),
                None => Interaction::Failed("malformed send reply".to_string()),
            },
            Err(e) => Interaction::Failed(e.to_string()),
        }
    }

    async fn read_text(&mut self, selector: &str) -> Option<String> {
        match self.call(json!({ "op": "readText", "selector": selector })).await {
            Ok(v) => v["text"]
                .as_str()
                .map(str::to_string)
                .filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Could not read '{}': {}", selector, e);
                None
            }
        }
    }

    async fn screenshot(&mut self, name: &str) -> Option<PathBuf> {
        self.shot_seq += 1;
        let file = format!(
            "{}-{}-{:03}.png",
            name,
            chrono::Local::now().format("%Y%m%d-%H%M%S"),
            self.shot_seq
        );
        let path = self.config.screenshot_dir.join(file);
        let command = json!({ "op": "screenshot", "path": path.to_string_lossy() });
        match self.call(command).await {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("Screenshot '{}' failed: {}", name, e);
                None
            }
        }
    }

    async fn scroll_down(&mut self, pixels: u32) {
        if let Err(e) = self.call(json!({ "op": "scroll", "pixels": pixels })).await {
            debug!("Scroll failed: {}", e);
        }
    }

    async fn close(&mut self) {
        if self.bridge.is_none() {
            return;
        }
        if let Err(e) = self.call(json!({ "op": "close" })).await {
            debug!("Bridge close reported: {}", e);
        }
        if let Some(mut bridge) = self.bridge.take() {
            let exited = tokio::time::timeout(Duration::from_secs(5), bridge.child.wait()).await;
            if exited.is_err() {
                warn!("Playwright bridge did not exit, killing it");
                let _ = bridge.child.kill().await;
            }
        }
        self._script_dir = None;
        info!("Browser closed");
    }
}
