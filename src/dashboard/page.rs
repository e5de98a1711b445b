//! Dashboard HTML page

use super::state::RunDefaults;

/// Escape text for use inside HTML attributes and element content
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const SCRIPT: &str = r#"
const feed = new EventSource('/api/feed');
const log = document.getElementById('log');
const cards = document.getElementById('cards');
const badge = document.getElementById('status');
const byName = new Map();

function card(c) {
  let el = byName.get(c.name);
  if (!el) {
    el = document.createElement('li');
    byName.set(c.name, el);
    cards.appendChild(el);
  }
  el.dataset.state = c.state || 'PENDING';
  el.textContent = `${c.name}: ${c.state || 'PENDING'} ${c.result || ''} ${c.lastMessage || c.error || ''}`;
}

feed.onmessage = (e) => {
  const line = JSON.parse(e.data);
  const row = document.createElement('div');
  row.className = line.severity;
  row.textContent = `[${line.moduleName || 'plan'}] ${line.message}`;
  log.appendChild(row);
  log.scrollTop = log.scrollHeight;
  if (line.moduleName && byName.has(line.moduleName)) {
    byName.get(line.moduleName).title = line.message;
  }
};
feed.addEventListener('moduleList', (e) => {
  cards.innerHTML = '';
  byName.clear();
  JSON.parse(e.data).forEach((name) => card({ name }));
  badge.textContent = 'Running';
});
feed.addEventListener('moduleUpdate', (e) => card(JSON.parse(e.data)));
feed.addEventListener('planDone', (e) => {
  const s = JSON.parse(e.data);
  badge.textContent = `Done: ${s.passed}/${s.total} passed, ${s.failed} failed`;
});
feed.addEventListener('stopped', () => { badge.textContent = 'Stopped'; });

document.getElementById('launch').addEventListener('submit', async (e) => {
  e.preventDefault();
  const f = e.target;
  log.innerHTML = '';
  const body = {
    configPath: f.configPath.value,
    planId: f.planId.value,
    token: f.token.value,
    serverUrl: f.serverUrl.value,
    pollInterval: Number(f.pollInterval.value),
    timeout: Number(f.timeout.value),
    headless: f.headless.checked,
  };
  const res = await fetch('/api/launch', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(body),
  });
  if (!res.ok) badge.textContent = (await res.json()).error;
});
document.getElementById('stop').addEventListener('click', () => fetch('/api/stop', { method: 'POST' }));
"#;

/// Render the dashboard with the launch form pre-filled
pub fn render(defaults: &RunDefaults, configs: &[String]) -> String {
    let options: String = configs
        .iter()
        .map(|path| format!("<option value=\"{0}\">{0}</option>", escape(path)))
        .collect();
    let first_config = configs.first().map(String::as_str).unwrap_or_default();
    let checked = if defaults.headless { " checked" } else { "" };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Conformance Autopilot</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 0; display: grid; grid-template-columns: 20rem 1fr; min-height: 100vh; }}
aside {{ padding: 1rem; background: #f4f4f6; }}
label {{ display: block; margin-bottom: .6rem; font-size: .85rem; }}
input {{ width: 100%; box-sizing: border-box; }}
main {{ padding: 1rem; }}
#log {{ font-family: monospace; font-size: .8rem; height: 50vh; overflow-y: auto; background: #111; color: #ddd; padding: .5rem; }}
#log .error {{ color: #f77; }}
#log .warn {{ color: #fc6; }}
li[data-state="FINISHED"] {{ color: #2a7; }}
li[data-state="INTERRUPTED"] {{ color: #c33; }}
</style>
</head>
<body>
<aside>
<h2>Plan</h2>
<form id="launch" autocomplete="off">
<label>Config file <input name="configPath" list="configs" value="{first_config}" required></label>
<datalist id="configs">{options}</datalist>
<label>Plan ID <input name="planId" value="{plan_id}" required></label>
<label>Bearer token <input name="token" type="password" value="{token}" required></label>
<label>Server URL <input name="serverUrl" value="{server}"></label>
<label>Poll interval (s) <input name="pollInterval" type="number" step="any" min="0.1" value="{poll}"></label>
<label>Timeout (s) <input name="timeout" type="number" step="any" min="1" value="{timeout}"></label>
<label><input name="headless" type="checkbox"{checked} style="width:auto"> Headless browser</label>
<button type="submit">Launch</button>
<button type="button" id="stop">Stop</button>
</form>
</aside>
<main>
<h1>Conformance Autopilot <small id="status">Idle</small></h1>
<ul id="cards"></ul>
<div id="log"></div>
</main>
<script>{script}</script>
</body>
</html>
"#,
        first_config = escape(first_config),
        options = options,
        plan_id = escape(&defaults.plan_id),
        token = escape(&defaults.token),
        server = escape(&defaults.server),
        poll = defaults.poll_interval_secs,
        timeout = defaults.timeout_secs,
        checked = checked,
        script = SCRIPT,
    )
}
