/// Mind Bloom: Descent, the headless gameplay core.
///
/// The simulation never renders and never reads the keyboard. A front-end
/// feeds it one `FrameInput` per tick (held keys, fresh presses, and the
/// contacts its physics collaborator observed) and consumes the returned
/// `PresentationEvent`s. The bundled terminal front-end lives in `main.rs`.

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
