//! Per-mode wording, prompts and voices.

use crate::error::{ErrorKind, ErrorNotice, InputError, SessionError};
use globo_types::{Mode, VoiceProfile};

pub const DEFAULT_VOICE_ID: &str = "iBGVhgcEZS6A5gTOjqSJ";

const WELCOME_STANDARD: &str = "¡Hola! Bienvenido a Proyecto: Globo — tu asistente de confianza para ayudarte con las tareas de matemáticas de quinto grado.\n\nEstoy aquí para apoyarte, paso a paso, con explicaciones claras y ejemplos que realmente hacen sentido. Puedes escribirme el problema que tiene tu hijo, o si prefieres, también puedes subir una foto del ejercicio que te mandó la maestra.\n\n¿Quieres empezar? Solo dime o envíame la imagen del problema y lo resolvemos juntos.";

const WELCOME_DEVELOPER: &str = "Hello RC - Project Globo Developer Mode enabled. I am here to help you test and develop the application. You can ask questions in English, and I will respond with structured data for easier debugging.";

const PROMPT_STANDARD: &str = "You are Gloria, a compassionate, culturally grounded AI tutor who helps Spanish-speaking parents support their children with 5th grade math homework. Use warm, patient Spanish with everyday examples. Format your response as a JSON object with lesson_summary, metaphor, importance, steps (numbered), and optional wolfram_query and send_to_voice fields.";

const PROMPT_DEVELOPER: &str = "You are Gloria, an AI tutor focused on helping with 5th grade math homework. Respond in clear, instructional English without cultural metaphors. Format your response as a JSON object with lesson_summary, steps (numbered), and optional wolfram_query for visualizations.";

/// Shared system message sent in both modes after the persona prompt.
pub const MATH_FOCUS_PROMPT: &str = "You are Gloria, a helpful AI assistant focused on providing accurate and concise information about mathematics problems. When analyzing images, focus on identifying and explaining mathematical concepts, equations, and problem-solving steps. Maintain context from previous messages to provide coherent responses.";

pub fn welcome_message(mode: Mode) -> &'static str {
    match mode {
        Mode::Standard => WELCOME_STANDARD,
        Mode::Developer => WELCOME_DEVELOPER,
    }
}

pub fn system_prompt(mode: Mode) -> &'static str {
    match mode {
        Mode::Standard => PROMPT_STANDARD,
        Mode::Developer => PROMPT_DEVELOPER,
    }
}

/// Text part that accompanies a photographed exercise in the vision request.
pub fn image_instruction(mode: Mode) -> &'static str {
    match mode {
        Mode::Standard => {
            "Por favor, analiza esta imagen y explícame el problema matemático que ves:"
        }
        Mode::Developer => "Please analyze this image and explain the math problem you see:",
    }
}

pub fn loading_message(mode: Mode) -> &'static str {
    match mode {
        Mode::Standard => "Un momento, estoy analizando tu pregunta...",
        Mode::Developer => "Processing your request...",
    }
}

/// Builds the notice shown to the user for a failed exchange.
pub fn error_notice(mode: Mode, err: &SessionError) -> ErrorNotice {
    ErrorNotice {
        kind: err.kind(),
        message: error_message(mode, err),
    }
}

fn error_message(mode: Mode, err: &SessionError) -> String {
    let spanish = mode == Mode::Standard;
    match err {
        SessionError::Input(InputError::Empty) => {
            if spanish {
                "El mensaje no puede estar vacío.".to_string()
            } else {
                "Message cannot be empty.".to_string()
            }
        }
        SessionError::Input(InputError::TooLong { max, .. }) => {
            if spanish {
                format!(
                    "El mensaje es demasiado largo. Por favor, limita tu mensaje a {max} caracteres."
                )
            } else {
                format!("Message is too long. Please limit your message to {max} characters.")
            }
        }
        SessionError::Input(InputError::ImageTooLarge { .. }) => {
            if spanish {
                "El archivo es demasiado grande. El tamaño máximo es 5MB.".to_string()
            } else {
                "The file is too large. The maximum size is 5MB.".to_string()
            }
        }
        SessionError::Input(InputError::NotAnImage) => {
            if spanish {
                "Por favor, selecciona una imagen.".to_string()
            } else {
                "Please select an image.".to_string()
            }
        }
        other => match other.kind() {
            ErrorKind::RateLimited => {
                if spanish {
                    "Hay demasiadas solicitudes en este momento. Por favor, intenta de nuevo en un momento.".to_string()
                } else {
                    "Rate limit exceeded. Please try again in a moment.".to_string()
                }
            }
            ErrorKind::InvalidCredential => {
                if spanish {
                    "La configuración del servicio no es válida. Por favor, avisa al equipo de Globo.".to_string()
                } else {
                    "Invalid API key. Please check your OpenAI configuration.".to_string()
                }
            }
            ErrorKind::Audio => {
                if spanish {
                    "No se pudo reproducir el audio.".to_string()
                } else {
                    "Audio playback failed.".to_string()
                }
            }
            ErrorKind::InputInvalid | ErrorKind::BackendUnavailable => {
                if spanish {
                    "Error al procesar tu pregunta. Por favor, intenta de nuevo.".to_string()
                } else {
                    "Error processing your request. Please try again.".to_string()
                }
            }
        },
    }
}

/// Voice identity and tuning for each mode.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceCatalog {
    standard: VoiceProfile,
    developer: VoiceProfile,
}

impl VoiceCatalog {
    pub fn new(standard_voice_id: &str, developer_voice_id: &str) -> Self {
        Self {
            standard: VoiceProfile {
                voice_id: standard_voice_id.to_string(),
                stability: 0.5,
                similarity_boost: 0.5,
                playback_rate: 0.95,
                volume: 0.9,
            },
            developer: VoiceProfile {
                voice_id: developer_voice_id.to_string(),
                stability: 0.5,
                similarity_boost: 0.5,
                playback_rate: 1.0,
                volume: 0.85,
            },
        }
    }

    pub fn for_mode(&self, mode: Mode) -> &VoiceProfile {
        match mode {
            Mode::Standard => &self.standard,
            Mode::Developer => &self.developer,
        }
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE_ID, DEFAULT_VOICE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    #[test]
    fn errors_are_worded_in_the_mode_language() {
        let err = SessionError::Backend(BackendError::RateLimited);
        let es = error_notice(Mode::Standard, &err);
        let en = error_notice(Mode::Developer, &err);

        assert_eq!(es.kind, ErrorKind::RateLimited);
        assert!(es.message.contains("intenta de nuevo"));
        assert_eq!(en.message, "Rate limit exceeded. Please try again in a moment.");
    }

    #[test]
    fn voices_differ_in_playback_tuning() {
        let voices = VoiceCatalog::new("es-voice", "en-voice");
        assert_eq!(voices.for_mode(Mode::Standard).voice_id, "es-voice");
        assert_eq!(voices.for_mode(Mode::Standard).playback_rate, 0.95);
        assert_eq!(voices.for_mode(Mode::Developer).volume, 0.85);
    }
}
