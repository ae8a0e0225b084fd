use bgg_similarity::config::DEBOUNCE_MS;
use gloo_timers::callback::Timeout;
use std::rc::Rc;
use web_sys::HtmlInputElement;
use yew::prelude::*;

/// State and callbacks for a text field validated as the user types.
#[derive(Clone)]
pub struct ValidatedInput {
    /// Raw text currently in the field.
    pub text: String,
    /// Validation message for the current text, if it was rejected.
    pub error: Option<String>,
    /// `oninput` handler: stores the text and validates it once typing pauses.
    pub on_text_input: Callback<InputEvent>,
    /// `onchange` handler: validates immediately.
    pub on_commit: Callback<Event>,
    /// Replace the text programmatically and validate it.
    pub set_text: Callback<String>,
}

/// Restart the pending timer so `callback` fires `delay_ms` after the last call.
pub fn debounce_callback<T: 'static>(
    timer_handle: &UseStateHandle<Option<Timeout>>,
    callback: Callback<T>,
    value: T,
    delay_ms: u32,
) {
    // Replacing the handle drops, and thereby cancels, the previous timer
    timer_handle.set(None);

    let timer_handle_clone = timer_handle.clone();
    let handle = Timeout::new(delay_ms, move || {
        callback.emit(value);
        timer_handle_clone.set(None);
    });
    timer_handle.set(Some(handle));
}

/// Hook for a text field whose content is checked by `parse_and_validate`.
///
/// Only the verdict is kept: operations read `text` and validate it again, so
/// a pending debounce never hands them an outdated value.
#[hook]
pub fn use_validated_input<T: 'static>(
    parse_and_validate: Rc<dyn Fn(&str) -> Result<T, String>>,
) -> ValidatedInput {
    let text_state = use_state(String::new);
    let error_state = use_state(|| None::<String>);
    let debounce_timer = use_state(|| None::<Timeout>);

    let validate = {
        let error_setter = error_state.clone();
        Callback::from(move |text: String| {
            error_setter.set(parse_and_validate(&text).err());
        })
    };

    let on_text_input = {
        let text_setter = text_state.clone();
        let validate = validate.clone();
        let debounce_timer = debounce_timer.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let text = input.value();
            text_setter.set(text.clone());
            debounce_callback(&debounce_timer, validate.clone(), text, DEBOUNCE_MS);
        })
    };

    let on_commit = {
        let validate = validate.clone();
        let debounce_timer = debounce_timer.clone();
        Callback::from(move |e: Event| {
            let input: HtmlInputElement = e.target_unchecked_into();
            debounce_timer.set(None);
            validate.emit(input.value());
        })
    };

    let set_text = {
        let text_setter = text_state.clone();
        Callback::from(move |text: String| {
            text_setter.set(text.clone());
            validate.emit(text);
        })
    };

    ValidatedInput {
        text: (*text_state).clone(),
        error: (*error_state).clone(),
        on_text_input,
        on_commit,
        set_text,
    }
}
