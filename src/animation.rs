use crate::figure::RenderError;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, RgbaImage};
use rayon::prelude::*;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

static PLAYER_ID: AtomicUsize = AtomicUsize::new(0);

/// A single pre-rendered frame and the titles of its panels.
#[derive(Clone, Debug)]
pub struct AnimationFrame {
    pub image: RgbaImage,
    pub titles: Vec<String>,
}

/// How [`Animation::render`] embeds the frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RenderFormat {
    /// Inline animated GIF, played like a looping video
    Html5Video,
    /// Frames as PNG data URIs driven by an inline script player
    #[default]
    JsHtml,
}

#[derive(Clone, Debug)]
pub struct Animation {
    frames: Vec<AnimationFrame>,
    interval_ms: u64,
    blit: bool,
}

impl Animation {
    pub fn new(frames: Vec<AnimationFrame>, interval_ms: u64, blit: bool) -> Self {
        Self {
            frames,
            interval_ms,
            blit,
        }
    }

    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Informational flag carried from the slicer options; the HTML player
    /// records it as `data-blit` and otherwise ignores it.
    pub fn blit(&self) -> bool {
        self.blit
    }

    /// Encode as an endlessly looping GIF.
    pub fn encode_gif(&self) -> Result<Vec<u8>, RenderError> {
        let delay = Delay::from_numer_denom_ms(self.interval_ms.min(u32::MAX as u64) as u32, 1);
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.set_repeat(Repeat::Infinite)?;
            encoder.encode_frames(
                self.frames
                    .iter()
                    .map(|frame| Frame::from_parts(frame.image.clone(), 0, 0, delay)),
            )?;
        }
        debug!(frames = self.frames.len(), bytes = bytes.len(), "encoded gif");
        Ok(bytes)
    }

    pub fn save_gif(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        std::fs::write(path, self.encode_gif()?)?;
        Ok(())
    }

    /// Render to an HTML fragment that can be embedded in a page or notebook.
    pub fn render(&self, format: RenderFormat) -> Result<String, RenderError> {
        match format {
            RenderFormat::Html5Video => self.render_video(),
            RenderFormat::JsHtml => self.render_jshtml(),
        }
    }

    pub fn render_to_file(
        &self,
        path: impl AsRef<Path>,
        format: RenderFormat,
    ) -> Result<(), RenderError> {
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }

    fn render_video(&self) -> Result<String, RenderError> {
        let gif = STANDARD.encode(self.encode_gif()?);
        let caption = self
            .frames
            .first()
            .map(|f| escape_html(&f.titles.join(" | ")))
            .unwrap_or_default();
        Ok(format!(
            "<figure class=\"volslice-animation\">\n\
             <img src=\"data:image/gif;base64,{gif}\" alt=\"animation of {count} frames\"/>\n\
             <figcaption>{caption}</figcaption>\n\
             </figure>\n",
            count = self.frames.len(),
        ))
    }

    fn render_jshtml(&self) -> Result<String, RenderError> {
        let data_uris = self
            .frames
            .par_iter()
            .map(|frame| {
                let mut png = Vec::new();
                frame
                    .image
                    .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
                Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
            })
            .collect::<Result<Vec<String>, RenderError>>()?;
        let captions: Vec<String> = self.frames.iter().map(|f| f.titles.join(" | ")).collect();

        let id = format!("volslice-{}", PLAYER_ID.fetch_add(1, Ordering::Relaxed));
        let last = self.frames.len().saturating_sub(1);
        let frames_js = script_json(&data_uris)?;
        let captions_js = script_json(&captions)?;

        let first = data_uris.first().map(String::as_str).unwrap_or_default();
        let caption = captions.first().map(String::as_str).map(escape_html).unwrap_or_default();
        let blit = self.blit;

        Ok(format!(
            r##"<div class="volslice-animation" id="{id}" data-blit="{blit}">
<img class="frame" src="{first}"/>
<p class="caption">{caption}</p>
<input class="slider" type="range" min="0" max="{last}" value="0"/>
<button class="prev">&#9664;&#9664;</button>
<button class="play">&#9654;</button>
<button class="next">&#9654;&#9654;</button>
</div>
<script>
(function() {{
  var root = document.getElementById("{id}");
  var frames = {frames_js};
  var captions = {captions_js};
  var img = root.querySelector(".frame");
  var caption = root.querySelector(".caption");
  var slider = root.querySelector(".slider");
  var current = 0;
  var timer = null;
  function show(i) {{
    current = (i + frames.length) % frames.length;
    img.src = frames[current];
    caption.textContent = captions[current];
    slider.value = current;
  }}
  function toggle() {{
    if (timer) {{ clearInterval(timer); timer = null; return; }}
    timer = setInterval(function() {{ show(current + 1); }}, {interval});
  }}
  root.querySelector(".prev").onclick = function() {{ show(current - 1); }};
  root.querySelector(".next").onclick = function() {{ show(current + 1); }};
  root.querySelector(".play").onclick = toggle;
  slider.oninput = function() {{ show(parseInt(slider.value, 10)); }};
}})();
</script>
"##,
            interval = self.interval_ms,
        ))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON for an inline script; `<` is escaped so a value cannot close the tag.
fn script_json(values: &[String]) -> Result<String, RenderError> {
    Ok(serde_json::to_string(values)?.replace('<', "\\u003c"))
}
