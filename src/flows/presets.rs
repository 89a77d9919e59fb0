//! Ready-made scripts for the common call flows.
//!
//! Audio paths are joined onto a caller-supplied base URL
//! (e.g. `https://host/audio`).

use std::time::Duration;

use super::script::{Branch, FlowScript, Menu};
use crate::call::{DtmfTone, Participant, Prompt, RecognizeOptions};

fn audio(base: &str, file: &str) -> Prompt {
    Prompt::new(format!("{}/{}", base.trim_end_matches('/'), file))
}

impl FlowScript {
    /// Plays one prompt and hangs up (outbound notice).
    pub fn play_and_hang_up(prompt: Prompt) -> Self {
        FlowScript::new().with_greeting(prompt)
    }

    /// Records the call, plays `menu_prompt` and collects one tone:
    /// `1` invites `agent` and hangs up once they joined, anything else hangs up.
    pub fn simple_ivr(menu_prompt: Prompt, agent: Participant) -> Self {
        let options = RecognizeOptions {
            initial_silence: Duration::from_secs(30),
            inter_tone: Duration::from_secs(5),
            ..RecognizeOptions::default()
        };
        let transfer = Branch::AddParticipant {
            target: agent,
            announce: None,
            await_confirmation: true,
        };
        let menu = Menu::new(menu_prompt)
            .with_options(options)
            .on(DtmfTone::One, transfer);
        FlowScript::new().with_recording().with_menu(menu)
    }

    /// Department menu: `1`-`3` play the sales / marketing / customer-care
    /// prompts, `4` announces and connects `agent`, `5` hangs up, anything
    /// else (or silence) plays the invalid-input prompt.
    pub fn main_menu(audio_base: &str, agent: Participant) -> Self {
        let play = |file: &str| Branch::Play(audio(audio_base, file));
        let invalid = play("invalid.wav");
        let menu = Menu::new(audio(audio_base, "mainmenu.wav"))
            .on(DtmfTone::One, play("sales.wav"))
            .on(DtmfTone::Two, play("marketing.wav"))
            .on(DtmfTone::Three, play("customercare.wav"))
            .on(
                DtmfTone::Four,
                Branch::AddParticipant {
                    target: agent,
                    announce: Some(audio(audio_base, "agent.wav")),
                    await_confirmation: false,
                },
            )
            .on(DtmfTone::Five, Branch::HangUp)
            .on_invalid(invalid.clone())
            .on_no_input(invalid);
        FlowScript::new().with_menu(menu)
    }

    /// Appointment reminder: `1` confirms, `2` cancels, other tones play the
    /// invalid-input prompt, silence plays the no-input prompt.
    pub fn appointment_reminder(audio_base: &str) -> Self {
        let play = |file: &str, source_id: &str| {
            Branch::Play(audio(audio_base, file).with_source_id(source_id))
        };
        let reminder = audio(audio_base, "reminder.wav").with_source_id("ReminderMessage");
        let menu = Menu::new(reminder)
            .on(DtmfTone::One, play("confirmed.wav", "ConfirmationMessage"))
            .on(DtmfTone::Two, play("cancelled.wav", "CancellationMessage"))
            .on_invalid(play("invalid.wav", "InvalidMessage"))
            .on_no_input(play("noinput.wav", "NoInputMessage"));
        FlowScript::new().with_menu(menu)
    }

    /// Answers and holds the call until the caller hangs up.
    pub fn connect_only() -> Self {
        FlowScript::new()
    }
}
