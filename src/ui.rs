//! Browser form for both demos, served at `/`

use axum::response::Html;

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Text Extractor &amp; Plate Gate</title>
<style>
  body { font-family: sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }
  section { border: 1px solid #ccc; border-radius: 6px; padding: 1rem; margin-bottom: 1.5rem; }
  img { max-width: 100%; margin-top: .5rem; }
  pre { background: #f4f4f4; padding: .75rem; overflow-x: auto; }
  .ok { color: #0a0; } .denied { color: #c00; }
</style>
</head>
<body>
<h1>Smart English Text Extractor</h1>

<section>
  <h2>Extract text</h2>
  <form id="ocr-form">
    <input type="file" name="file" accept="image/png,image/jpeg" required>
    <select name="preset">
      <option value="">server default</option>
      <option value="none">none</option>
      <option value="minimal">minimal</option>
      <option value="document">document</option>
    </select>
    <button type="submit">Extract</button>
  </form>
  <div id="ocr-result"></div>
</section>

<section>
  <h2>Plate gate</h2>
  <form id="scan-form">
    <input type="file" name="file" accept="image/png,image/jpeg" required>
    <select name="action"><option value="entry">Entry</option><option value="exit">Exit</option></select>
    <button type="submit">Scan plate</button>
  </form>
  <form id="manual-form">
    <input name="plate" placeholder="Plate number" required>
    <select name="action"><option value="entry">Entry</option><option value="exit">Exit</option></select>
    <button type="submit">Submit</button>
  </form>
  <div id="gate-result"></div>

  <h3>Add new plate</h3>
  <form id="add-form">
    <input name="plate" placeholder="Plate number" required>
    <select name="status"><option value="out">out</option><option value="in">in</option></select>
    <button type="submit">Add</button>
  </form>

  <h3>Authorized plates</h3>
  <pre id="plates"></pre>
</section>

<script>
const $ = (id) => document.getElementById(id);
const escape = (s) => String(s).replace(/[&<>"]/g, (c) => ({"&":"&amp;","<":"&lt;",">":"&gt;","\"":"&quot;"}[c]));

async function refreshPlates() {
  const res = await fetch("/plates");
  const plates = await res.json();
  $("plates").textContent = plates.map((p) => `${p.plate}\t${p.status}`).join("\n");
}

function showGate(body) {
  if (body.error) { $("gate-result").innerHTML = `<p class="denied">${escape(body.error)}</p>`; return; }
  const cls = body.allowed ? "ok" : "denied";
  $("gate-result").innerHTML = `<p class="${cls}"><b>${escape(body.plate)}</b>: ${escape(body.message)}</p>`;
  refreshPlates();
}

$("ocr-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  if (!form.get("preset")) form.delete("preset");
  form.set("annotate", "true");
  $("ocr-result").textContent = "Extracting text...";
  const res = await fetch("/ocr", { method: "POST", body: form });
  const body = await res.json();
  if (!res.ok) { $("ocr-result").innerHTML = `<p class="denied">${escape(body.error)}</p>`; return; }
  let html = body.warnings.map((w) => `<p>${escape(w)}</p>`).join("");
  html += body.regions.map((r) =>
    `<p><b>Region ${r.index + 1}:</b><br>Bounding Box: ${escape(JSON.stringify(r.bounding_box))}` +
    `<br>Text: <b>${escape(r.text)}</b><br>Confidence: ${r.confidence.toFixed(4)}</p>`).join("<hr>");
  $("ocr-result").innerHTML = html;
  if (body.regions.length && body.annotated_png) {
    const img = document.createElement("img");
    img.src = `data:image/png;base64,${body.annotated_png}`;
    img.alt = "Text regions highlighted";
    $("ocr-result").appendChild(img);
  }
});

$("scan-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const res = await fetch("/plates/scan", { method: "POST", body: new FormData(e.target) });
  showGate(await res.json());
});

$("manual-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  const plate = encodeURIComponent(form.get("plate"));
  const res = await fetch(`/plates/${plate}/${form.get("action")}`, { method: "POST" });
  showGate(await res.json());
});

$("add-form").addEventListener("submit", async (e) => {
  e.preventDefault();
  const form = new FormData(e.target);
  await fetch("/plates", {
    method: "POST",
    headers: { "content-type": "application/json" },
    body: JSON.stringify({ plate: form.get("plate"), status: form.get("status") }),
  });
  e.target.reset();
  refreshPlates();
});

refreshPlates();
</script>
</body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
