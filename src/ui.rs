//! The 2D layer over the canvas: hover label, embedded page overlay and
//! transient notifications.
//!
//! Input handling never touches the page directly. It emits [`UiCommand`]s
//! and a [`UiSurface`] carries them out.

/// Overlay placement in physical pixels from the top left of the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayRect {
    /// Centred in the viewport: 90% x 70% below 600 px of width, 80% x 80% otherwise.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let (fw, fh) = if width < 600 { (0.9, 0.7) } else { (0.8, 0.8) };
        let (ow, oh) = (w * fw, h * fh);
        Self {
            x: (w - ow) / 2.0,
            y: (h - oh) / 2.0,
            width: ow,
            height: oh,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UiCommand {
    ShowLabel { text: String, x: f64, y: f64 },
    HideLabel,
    OpenOverlay { url: String, rect: OverlayRect },
    /// Moves an open overlay after a resize.
    ResizeOverlay(OverlayRect),
    CloseOverlay,
    Notify(String),
}

pub trait UiSurface {
    fn apply(&mut self, command: &UiCommand);

    /// True once after the user closed the overlay through the surface
    /// itself (the EXIT button).
    fn take_dismissed(&mut self) -> bool {
        false
    }
}

/// Logs every command and remembers what would be on screen.
#[derive(Debug, Default)]
pub struct LogSurface {
    pub label: Option<String>,
    pub overlay: Option<String>,
}

impl UiSurface for LogSurface {
    fn apply(&mut self, command: &UiCommand) {
        match command {
            UiCommand::ShowLabel { text, .. } => {
                if self.label.as_deref() != Some(text) {
                    log::info!("label: {}", text);
                }
                self.label = Some(text.clone());
            }
            UiCommand::HideLabel => self.label = None,
            UiCommand::OpenOverlay { url, rect } => {
                log::info!("overlay {} at {:?}", url, rect);
                self.overlay = Some(url.clone());
            }
            UiCommand::ResizeOverlay(rect) => log::debug!("overlay moved to {:?}", rect),
            UiCommand::CloseOverlay => {
                log::info!("overlay closed");
                self.overlay = None;
            }
            UiCommand::Notify(text) => log::info!("{}", text),
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use dom::DomSurface;

#[cfg(target_arch = "wasm32")]
mod dom {
    use std::{cell::Cell, rc::Rc};

    use wasm_bindgen::{JsCast, prelude::*};

    use super::{OverlayRect, UiCommand, UiSurface};

    const NOTIFICATION_MS: i32 = 2000;

    fn px(v: f64) -> String {
        format!("{}px", v.round())
    }

    /// Absolutely positioned DOM elements over the canvas.
    pub struct DomSurface {
        document: web_sys::Document,
        label: web_sys::HtmlElement,
        overlay: Option<web_sys::Element>,
        dismissed: Rc<Cell<bool>>,
    }

    impl DomSurface {
        pub fn new() -> Result<Self, JsValue> {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or("no document")?;
            let body = document.body().ok_or("no body")?;
            let label: web_sys::HtmlElement = document.create_element("div")?.dyn_into()?;
            label.set_attribute(
                "style",
                "position:absolute;display:none;padding:4px 8px;background:rgba(0,0,0,0.7);\
                 color:#fff;font:14px sans-serif;border-radius:4px;pointer-events:none;",
            )?;
            body.append_child(&label)?;
            Ok(Self {
                document,
                label,
                overlay: None,
                dismissed: Rc::new(Cell::new(false)),
            })
        }

        fn show_label(&self, text: &str, x: f64, y: f64) -> Result<(), JsValue> {
            self.label.set_inner_text(text);
            let style = self.label.style();
            style.set_property("left", &px(x))?;
            style.set_property("top", &px(y))?;
            style.set_property("display", "block")
        }

        fn place(element: &web_sys::Element, rect: &OverlayRect) -> Result<(), JsValue> {
            element.set_attribute(
                "style",
                &format!(
                    "position:absolute;left:{};top:{};width:{};height:{};background:#fff;\
                     box-shadow:0 0 20px rgba(0,0,0,0.6);z-index:10;",
                    px(rect.x),
                    px(rect.y),
                    px(rect.width),
                    px(rect.height)
                ),
            )
        }

        fn open_overlay(&mut self, url: &str, rect: &OverlayRect) -> Result<(), JsValue> {
            self.close_overlay();
            let container = self.document.create_element("div")?;
            Self::place(&container, rect)?;

            let frame = self.document.create_element("iframe")?;
            frame.set_attribute("src", url)?;
            frame.set_attribute("style", "width:100%;height:100%;border:0;")?;
            container.append_child(&frame)?;

            let exit = self.document.create_element("button")?;
            exit.set_text_content(Some("EXIT"));
            exit.set_attribute("style", "position:absolute;top:8px;right:8px;z-index:11;")?;
            let dismissed = self.dismissed.clone();
            let target = container.clone();
            let on_exit = Closure::<dyn FnMut()>::new(move || {
                target.remove();
                dismissed.set(true);
            });
            exit.add_event_listener_with_callback("click", on_exit.as_ref().unchecked_ref())?;
            // the listener lives as long as the button
            on_exit.forget();
            container.append_child(&exit)?;

            self.document.body().ok_or("no body")?.append_child(&container)?;
            self.overlay = Some(container);
            Ok(())
        }

        fn close_overlay(&mut self) {
            if let Some(overlay) = self.overlay.take() {
                overlay.remove();
            }
        }

        fn notify(&self, text: &str) -> Result<(), JsValue> {
            let note = self.document.create_element("div")?;
            note.set_text_content(Some(text));
            note.set_attribute(
                "style",
                "position:absolute;top:20px;left:50%;transform:translateX(-50%);padding:6px 12px;\
                 background:rgba(0,0,0,0.75);color:#fff;font:16px sans-serif;border-radius:4px;",
            )?;
            self.document.body().ok_or("no body")?.append_child(&note)?;
            let remove = Closure::once_into_js(move || note.remove());
            web_sys::window()
                .ok_or("no window")?
                .set_timeout_with_callback_and_timeout_and_arguments_0(remove.unchecked_ref(), NOTIFICATION_MS)?;
            Ok(())
        }
    }

    impl UiSurface for DomSurface {
        fn apply(&mut self, command: &UiCommand) {
            let result = match command {
                UiCommand::ShowLabel { text, x, y } => self.show_label(text, *x, *y),
                UiCommand::HideLabel => self.label.style().set_property("display", "none"),
                UiCommand::OpenOverlay { url, rect } => self.open_overlay(url, rect),
                UiCommand::ResizeOverlay(rect) => match &self.overlay {
                    Some(overlay) => Self::place(overlay, rect),
                    None => Ok(()),
                },
                UiCommand::CloseOverlay => {
                    self.close_overlay();
                    Ok(())
                }
                UiCommand::Notify(text) => self.notify(text),
            };
            if let Err(e) = result {
                log::error!("could not update the page for {:?}: {:?}", command, e);
            }
        }

        fn take_dismissed(&mut self) -> bool {
            if self.dismissed.replace(false) {
                self.overlay = None;
                true
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_viewport_overlay() {
        let rect = OverlayRect::for_viewport(400, 800);
        assert_eq!(rect.width, 360.0);
        assert_eq!(rect.height, 560.0);
        assert_eq!((rect.x, rect.y), (20.0, 120.0));
    }

    #[test]
    fn wide_viewport_overlay() {
        let rect = OverlayRect::for_viewport(1000, 500);
        assert_eq!((rect.width, rect.height), (800.0, 400.0));
        assert_eq!((rect.x, rect.y), (100.0, 50.0));
        assert!(rect.contains(500.0, 250.0));
        assert!(!rect.contains(50.0, 250.0));
    }

    #[test]
    fn log_surface_tracks_state() {
        let mut surface = LogSurface::default();
        surface.apply(&UiCommand::ShowLabel {
            text: "Game Boy".into(),
            x: 10.0,
            y: 10.0,
        });
        surface.apply(&UiCommand::OpenOverlay {
            url: "https://example.org".into(),
            rect: OverlayRect::for_viewport(800, 600),
        });
        surface.apply(&UiCommand::HideLabel);
        assert_eq!(surface.label, None);
        assert_eq!(surface.overlay.as_deref(), Some("https://example.org"));
        assert!(!surface.take_dismissed());
    }
}
