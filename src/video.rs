//! Video frames for the screen primitive.
//!
//! A [`VideoFeed`] is polled once per frame. New frames replace the image of
//! every video material on the screen member; a feed error is logged and the
//! screen keeps showing its last frame.

use std::{collections::VecDeque, sync::Arc};

use image::RgbaImage;

use crate::data_structures::scene_registry::{MemberId, SceneRegistry};

pub trait VideoFeed {
    /// The next frame, or `None` when nothing new is available yet.
    fn poll_frame(&mut self) -> anyhow::Result<Option<RgbaImage>>;
}

/// Plays a list of decoded frames once, then holds.
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: VecDeque<RgbaImage>,
}

impl FrameSequence {
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl VideoFeed for FrameSequence {
    fn poll_frame(&mut self) -> anyhow::Result<Option<RgbaImage>> {
        Ok(self.frames.pop_front())
    }
}

/// A hidden `<video>` element sampled through a 2D canvas.
#[cfg(target_arch = "wasm32")]
pub struct HtmlVideoFeed {
    video: web_sys::HtmlVideoElement,
    canvas: web_sys::HtmlCanvasElement,
    context: web_sys::CanvasRenderingContext2d,
    last_time: f64,
}

#[cfg(target_arch = "wasm32")]
impl HtmlVideoFeed {
    pub fn new(src: &str) -> anyhow::Result<Self> {
        use wasm_bindgen::JsCast;

        let js = |e: wasm_bindgen::JsValue| anyhow::anyhow!("{:?}", e);
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| anyhow::anyhow!("no document"))?;
        let video: web_sys::HtmlVideoElement = document.create_element("video").map_err(js)?.dyn_into().map_err(js)?;
        video.set_cross_origin(Some("anonymous"));
        video.set_src(src);
        video.set_loop(true);
        video.set_muted(true);
        video.set_autoplay(true);
        // autoplay may be refused until the first user gesture; the feed just stays empty
        let playing = wasm_bindgen_futures::JsFuture::from(video.play().map_err(js)?);
        let source = src.to_string();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = playing.await {
                log::error!("video {} did not start: {:?}", source, e);
            }
        });

        let canvas: web_sys::HtmlCanvasElement = document.create_element("canvas").map_err(js)?.dyn_into().map_err(js)?;
        let context: web_sys::CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(js)?
            .ok_or_else(|| anyhow::anyhow!("2d canvas context is unavailable"))?
            .dyn_into()
            .map_err(js)?;
        Ok(Self {
            video,
            canvas,
            context,
            last_time: -1.0,
        })
    }
}

#[cfg(target_arch = "wasm32")]
impl VideoFeed for HtmlVideoFeed {
    fn poll_frame(&mut self) -> anyhow::Result<Option<RgbaImage>> {
        let js = |e: wasm_bindgen::JsValue| anyhow::anyhow!("{:?}", e);

        let error = self.video.error().map(|e| e.code());
        if !frame_ready(error, self.video.ready_state())? {
            return Ok(None);
        }
        let time = self.video.current_time();
        if time == self.last_time {
            return Ok(None);
        }
        self.last_time = time;

        let (w, h) = (self.video.video_width(), self.video.video_height());
        if w == 0 || h == 0 {
            return Ok(None);
        }
        self.canvas.set_width(w);
        self.canvas.set_height(h);
        self.context
            .draw_image_with_html_video_element_and_dw_and_dh(&self.video, 0.0, 0.0, w as f64, h as f64)
            .map_err(js)?;
        let data = self
            .context
            .get_image_data(0.0, 0.0, w as f64, h as f64)
            .map_err(js)?
            .data();
        RgbaImage::from_raw(w, h, data.0)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("video frame has the wrong size"))
    }
}

/// Whether a media element can be sampled. A set `MediaError` code fails the
/// feed; a source that never loads would otherwise just stay not ready.
#[cfg(any(target_arch = "wasm32", test))]
fn frame_ready(error: Option<u16>, ready_state: u16) -> anyhow::Result<bool> {
    const HAVE_CURRENT_DATA: u16 = 2;
    match error {
        Some(1) => anyhow::bail!("playback aborted"),
        Some(2) => anyhow::bail!("network error while fetching the video"),
        Some(3) => anyhow::bail!("video could not be decoded"),
        Some(4) => anyhow::bail!("video source is not supported"),
        Some(code) => anyhow::bail!("media error {}", code),
        None => Ok(ready_state >= HAVE_CURRENT_DATA),
    }
}

/// The feed for `src` on this platform.
pub fn open_feed(src: &str) -> Box<dyn VideoFeed> {
    #[cfg(target_arch = "wasm32")]
    {
        match HtmlVideoFeed::new(src) {
            Ok(feed) => return Box::new(feed),
            Err(e) => log::error!("could not open video {}: {}", src, e),
        }
    }
    #[cfg(not(target_arch = "wasm32"))]
    log::info!("video {} is only played by the web build", src);
    Box::new(FrameSequence::default())
}

/// Binds a feed to the member showing it.
pub struct VideoScreen {
    pub member: MemberId,
    feed: Box<dyn VideoFeed>,
    failing: bool,
}

impl VideoScreen {
    pub fn new(member: MemberId, feed: Box<dyn VideoFeed>) -> Self {
        Self {
            member,
            feed,
            failing: false,
        }
    }

    /// Polls the feed and uploads a new frame into the screen's video
    /// materials. Returns whether the screen changed.
    pub fn refresh(&mut self, registry: &mut SceneRegistry) -> bool {
        let frame = match self.feed.poll_frame() {
            Ok(Some(frame)) => Arc::new(frame),
            Ok(None) => return false,
            Err(e) => {
                // one entry per outage, not one per frame
                if !self.failing {
                    log::error!("video feed failed, keeping the last frame: {}", e);
                    self.failing = true;
                }
                return false;
            }
        };
        self.failing = false;
        let Some(member) = registry.model_mut(self.member) else {
            return false;
        };
        let model = Arc::make_mut(&mut member.model);
        let mut changed = false;
        for material in model.materials.iter_mut().filter(|m| m.is_video()) {
            material.set_video_frame(frame.clone());
            changed = true;
        }
        log::trace!("video frame {}x{}", frame.width(), frame.height());
        changed
    }
}

impl std::fmt::Debug for VideoScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoScreen")
            .field("member", &self.member)
            .field("failing", &self.failing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        geometry::plane,
        instance::Transform,
        model::{Material, ModelData, Surface},
        scene_registry::{MemberKind, SceneMember},
    };

    struct Broken;

    impl VideoFeed for Broken {
        fn poll_frame(&mut self) -> anyhow::Result<Option<RgbaImage>> {
            anyhow::bail!("decoder stalled")
        }
    }

    fn screen(registry: &mut SceneRegistry) -> MemberId {
        let mut material = Material::color("screen", [1.0; 4]);
        material.surface = Surface::Video(None);
        registry.insert(SceneMember::model(
            MemberKind::Primitive("screen".into()),
            Arc::new(ModelData::from_mesh(plane("screen", 2.0, 1.0), material)),
            Transform::new(),
        ))
    }

    fn pixel(registry: &SceneRegistry, id: MemberId) -> Option<image::Rgba<u8>> {
        let model = &registry.model(id)?.model;
        model.materials[0].image().map(|img| *img.get_pixel(0, 0))
    }

    #[test]
    fn new_frames_replace_the_image() {
        let mut registry = SceneRegistry::new();
        let id = screen(&mut registry);
        let red = RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        let blue = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 255, 255]));
        let mut video = VideoScreen::new(id, Box::new(FrameSequence::new(vec![red, blue])));
        assert!(video.refresh(&mut registry));
        assert_eq!(pixel(&registry, id), Some(image::Rgba([255, 0, 0, 255])));
        assert!(video.refresh(&mut registry));
        assert!(!video.refresh(&mut registry));
        assert_eq!(pixel(&registry, id), Some(image::Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn media_errors_fail_the_feed() {
        assert!(!frame_ready(None, 0).unwrap());
        assert!(frame_ready(None, 2).unwrap());
        let err = frame_ready(Some(4), 0).unwrap_err();
        assert_eq!(err.to_string(), "video source is not supported");
        assert!(frame_ready(Some(2), 4).is_err());
    }

    #[test]
    fn failing_feed_keeps_the_screen() {
        let mut registry = SceneRegistry::new();
        let id = screen(&mut registry);
        let mut video = VideoScreen::new(id, Box::new(Broken));
        assert!(!video.refresh(&mut registry));
        assert!(!video.refresh(&mut registry));
        assert_eq!(pixel(&registry, id), None);
    }
}
