//! Presentation and audio boundary consumed by the session engine.

/// External presentation/audio collaborator.
///
/// Implementations own the speaker (and any debugging display); the engine
/// only reports what happened. Every method is fire-and-forget: the engine
/// never waits on a presenter call, it only polls [`is_audio_playing`]
/// when a scene defers its answer deadline until the audio ends.
///
/// [`is_audio_playing`]: Presenter::is_audio_playing
pub trait Presenter {
    /// Show a scene's text and its numbered options to the player.
    fn display(&self, text: &str, options: &[(u8, &str)]);

    /// Start the audio for a scene, replacing any audio still playing.
    fn play_scene_audio(&self, scene_id: &str);

    /// Stop any in-flight audio.
    fn stop_audio(&self);

    /// Whether scene audio is still playing.
    fn is_audio_playing(&self) -> bool;

    /// An item was just added to the inventory.
    fn notify_item_obtained(&self, item: &str);

    /// A key-press was accepted by the debouncer (feedback tone).
    fn notify_key_accepted(&self, key: char);
}
