//! Request builders for every (capability, prompt variant) pair.
//!
//! Builders are pure: the same inputs always produce the same request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::{schema_for, JsonSchema};

use crate::core::{ChatMessage, ChatRequest, ImageDetail};
use crate::error::QuizError;
use crate::model::{AnalysisResult, GradingRequest, GradingResult};
use crate::parser::JsonMode;

static RE_DATA_URL_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^data:image/[a-z]+;base64,").unwrap());

/// Token budget and temperature for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Sampling {
    pub const fn new(max_tokens: u32, temperature: f32) -> Self {
        Self { max_tokens, temperature }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrPrompt {
    /// Full-page extraction keeping headings, captions, lists and tables.
    Detailed,
    /// Plain text, line by line.
    Brief,
    /// First step of image analysis.
    Quick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPrompt {
    Facts,
    Comprehension,
    NumberedList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingPrompt {
    Detailed,
    Brief,
}

// Schema-guided prompts invite prose around the JSON, so their replies are scanned.
impl QuestionPrompt {
    pub fn json_mode(self) -> JsonMode {
        match self {
            Self::Comprehension => JsonMode::Lenient,
            Self::Facts | Self::NumberedList => JsonMode::Strict,
        }
    }
}

impl GradingPrompt {
    pub fn json_mode(self) -> JsonMode {
        match self {
            Self::Brief => JsonMode::Lenient,
            Self::Detailed => JsonMode::Strict,
        }
    }
}

/// Strip a `data:image/...;base64,` prefix and check the payload decodes.
pub fn normalize_image(image_base64: &str) -> Result<String, QuizError> {
    let payload = RE_DATA_URL_PREFIX.replace(image_base64.trim(), "");
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(QuizError::invalid_input("Bild krävs"));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| QuizError::invalid_input(format!("Ogiltig base64-bild: {e}")))?;
    Ok(payload.to_string())
}

pub fn image_data_url(payload: &str) -> String {
    format!("data:image/jpeg;base64,{payload}")
}

fn require<'a>(value: &'a str, message: &str) -> Result<&'a str, QuizError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(QuizError::invalid_input(message))
    } else {
        Ok(trimmed)
    }
}

/// Append the JSON schema of `T` as a response-format section.
pub fn add_schema_guidance<T: JsonSchema>(prompt: String) -> String {
    let schema = schema_for!(T);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "Schema serialization failed".to_string());
    format!(
        "{prompt}\n\n## Svarsformat\nInkludera giltig JSON som följer detta schema någonstans i ditt svar:\n```json\n{schema_json}\n```"
    )
}

fn request(model: &str, messages: Vec<ChatMessage>, sampling: Sampling) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages,
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
    }
}

const DETAILED_OCR: &str = "Extrahera ALL text från bilden noggrant och komplett. Inkludera:
- All huvudtext och brödtext
- Rubriker och underrubriker
- Bildtexter, faktarutor och sidotexter
- Punktlistor och numrerade listor
- Tabeller och diagram-text
- Fotnoter och referenser

Behåll textens struktur och organisation. Returnera som välformaterad text med tydlig hierarki.";

const BRIEF_OCR: &str = "Extrahera all text från bilden. Returnera som ren text, ordnad rad för rad.";
const QUICK_OCR: &str = "Extrahera all text från bilden. Returnera som ren text.";

/// OCR request with the image inlined as a data URL. `image_base64` must already be normalized.
pub fn ocr_request(variant: OcrPrompt, model: &str, image_base64: &str, sampling: Sampling) -> Result<ChatRequest, QuizError> {
    let payload = require(image_base64, "Bild krävs")?;
    let (instruction, detail) = match variant {
        OcrPrompt::Detailed => (DETAILED_OCR, ImageDetail::High),
        OcrPrompt::Brief => (BRIEF_OCR, ImageDetail::Low),
        OcrPrompt::Quick => (QUICK_OCR, ImageDetail::Low),
    };
    Ok(request(
        model,
        vec![ChatMessage::user_with_image(instruction, image_data_url(payload), detail)],
        sampling,
    ))
}

const FACTS_SYSTEM: &str = "Du är en erfaren lärare som skapar faktafrågor för grundskoleelever. Du läser texten noggrant och skapar frågor där svaren är specifika fakta som nämns i texten.";

const FACTS_RULES: &str = "VIKTIGA REGLER:
1. Läs texten och identifiera specifika fakta som nämns (namn, platser, antal, vad saker består av, etc.)
2. Skapa frågor där svaret är ett konkret faktum från texten
3. Svaret ska vara 1-3 ord som är direkt nämnda i texten
4. Ignorera meta-information om texten själv - fokusera bara på innehållet

EXEMPEL PÅ BRA FRÅGOR (om texten innehåller denna info):
- Om texten säger \"Solen består av väte och helium\" → Fråga: \"Vad består solen av?\" Svar: \"Väte och helium\"
- Om texten säger \"Sverige har 25 landskap\" → Fråga: \"Hur många landskap har Sverige?\" Svar: \"25\"
- Om texten säger \"Fotosyntesen sker i kloroplasterna\" → Fråga: \"Var sker fotosyntesen?\" Svar: \"Kloroplasterna\"

Returnera JSON:
{
  \"subject\": \"ämne baserat på textinnehållet\",
  \"difficulty\": \"Lätt/Medel/Svår\",
  \"questions\": [
    {
      \"id\": 1,
      \"question\": \"Faktafråga baserad på konkret information i texten\",
      \"options\": [\"korrekt svar från texten\", \"felaktigt alternativ\", \"felaktigt alternativ\", \"felaktigt alternativ\"],
      \"correctAnswer\": 0,
      \"expectedAnswer\": \"exakt svar från texten\",
      \"explanation\": \"Referens till var i texten svaret finns\"
    }
  ]
}";

const COMPREHENSION_SYSTEM: &str = "Du är en erfaren lärare som skapar pedagogiska förståelsefrågor för svenska grundskoleelever. Basera frågorna på textinnehållet men gör dem utmanande och lärorika. Fokusera på förståelse, samband och analys - inte på enkla ordmeaningar. Skapa trovärdiga svarsalternativ.";

const COMPREHENSION_RULES: &str = "VIKTIGA REGLER FÖR FRÅGORNA:
- Skapa EXAKT 8 pedagogiska frågor baserat på textinnehållet
- Fråga om FÖRSTÅELSE av innehållet, inte ordmening
- Skapa frågor om: huvudbudskap, samband, orsaker, följder, slutsatser
- Använd begrepp och fakta som finns i texten
- Skapa TROVÄRDIGA felaktiga alternativ (inte \"annat ord\", \"tredje alternativ\")

EXEMPEL PÅ BRA FRÅGOR:
- \"Vad är huvudorsaken till... (enligt texten)?\"
- \"Vilket resultat beskrivs när...?\"
- \"Hur förklarar texten sambandet mellan X och Y?\"

SVARSALTERNATIV:
- Ett korrekt svar från texten
- Tre rimliga men felaktiga alternativ (kan vara från texten men fel sammanhang, eller logiska men felaktiga påståenden)";

/// Question-generation request for source text.
pub fn questions_request(variant: QuestionPrompt, model: &str, text: &str, sampling: Sampling) -> Result<ChatRequest, QuizError> {
    let text = require(text, "Text krävs")?;
    let messages = match variant {
        QuestionPrompt::Facts => vec![
            ChatMessage::system(FACTS_SYSTEM),
            ChatMessage::user(format!(
                "Läs denna text noggrant och skapa 8 faktafrågor baserat på KONKRETA FAKTA som nämns i texten:\n\n\"{text}\"\n\n{FACTS_RULES}"
            )),
        ],
        QuestionPrompt::Comprehension => vec![
            ChatMessage::system(COMPREHENSION_SYSTEM),
            ChatMessage::user(add_schema_guidance::<AnalysisResult>(format!(
                "Text från elevens läxa: \"{text}\"\n\n{COMPREHENSION_RULES}"
            ))),
        ],
        QuestionPrompt::NumberedList => vec![ChatMessage::user(format!(
            "Text: \"{text}\"\n\nSkapa 3 enkla faktafrågor från denna text. Svaren ska vara ord/fraser som finns direkt i texten.\n\n\
             Format:\n1. [Fråga] - Svar: [ord från texten]\n2. [Fråga] - Svar: [ord från texten]\n3. [Fråga] - Svar: [ord från texten]"
        ))],
    };
    Ok(request(model, messages, sampling))
}

const IMAGE_QUESTIONS_TEMPLATE: &str = "Skapa 5 pedagogiska frågor baserat på texten. Returnera JSON:
{
  \"subject\": \"identifierat ämne\",
  \"questions\": [
    {
      \"id\": 1,
      \"question\": \"fråga om innehållet\",
      \"options\": [\"rätt svar\", \"fel 1\", \"fel 2\", \"fel 3\"],
      \"correctAnswer\": 0,
      \"expectedAnswer\": \"rätt svar\",
      \"explanation\": \"förklaring\"
    }
  ]
}";

/// Second step of image analysis: five questions from the OCR text.
pub fn image_questions_request(model: &str, ocr_text: &str, sampling: Sampling) -> Result<ChatRequest, QuizError> {
    let text = require(ocr_text, "Text krävs")?;
    Ok(request(
        model,
        vec![ChatMessage::user(format!("Text från bild: \"{text}\"\n\n{IMAGE_QUESTIONS_TEMPLATE}"))],
        sampling,
    ))
}

const GENERAL_SYSTEM: &str = "Du är en pedagogisk assistent som skapar lämpliga frågor för grundskoleelever. Skapa varierade, pedagogiska frågor inom olika ämnen.";

const GENERAL_USER: &str = "Bildanalysen misslyckades, men skapa ändå 10 bra pedagogiska frågor för en svensk grundskoleelev.

Returnera JSON:
{
  \"subject\": \"Allmänbildning\",
  \"difficulty\": \"Medel\",
  \"isVocabulary\": false,
  \"questions\": [
    {
      \"id\": 1,
      \"question\": \"pedagogisk fråga inom matematik, svenska, naturvetenskap eller historia\",
      \"options\": [\"alternativ 1\", \"alternativ 2\", \"alternativ 3\", \"alternativ 4\"],
      \"correctAnswer\": 0,
      \"expectedAnswer\": \"kort svar\",
      \"explanation\": \"pedagogisk förklaring\"
    }
  ]
}

Skapa varierande frågor inom olika ämnen som matematik, svenska, naturvetenskap, geografi och historia. Gör dem lämpliga för ålder 10-15 år.";

/// Ten general-knowledge questions; used when the image could not be read.
pub fn general_knowledge_request(model: &str, sampling: Sampling) -> ChatRequest {
    request(model, vec![ChatMessage::system(GENERAL_SYSTEM), ChatMessage::user(GENERAL_USER)], sampling)
}

const GRADING_TEMPLATE: &str = "Bedöm elevens svar och returnera JSON:
{
  \"isCorrect\": true/false,
  \"feedback\": \"pedagogisk feedback på svenska\",
  \"score\": nummer mellan 0-100,
  \"isValidTranslation\": true/false
}
(isValidTranslation gäller endast glosfrågor där svaret är en korrekt översättning men inte målordet)

Kriterier för bedömning:
- Helt rätt svar: 90-100p
- Mestadels rätt: 70-89p
- Delvis rätt: 50-69p
- Nära men fel: 30-49p
- Helt fel: 0-29p";

fn detailed_grading_system(req: &GradingRequest) -> String {
    let rubric = match &req.vocabulary_pair {
        Some(pair) => format!(
            "VIKTIGT: Detta är en glosfråga baserad på exakt ordpar från elevens läxbild.
Målordet från glosorna: \"{expected}\" (från ordparet: {w1} ↔ {w2})

OBS! Målordet kan innehålla flera alternativ separerade med komma, semikolon, eller \"eller\".
T.ex. \"hund, valp\" eller \"bil; fordon\" eller \"gå eller springa\".
Om målordet har flera alternativ räcker det att eleven svarar ETT av dem korrekt.

Bedöm svaret enligt följande kriterier:
1. Om svaret matchar ETT av alternativen i målordet → isCorrect: true, score: 90-100
2. Om svaret är en korrekt översättning men inte något av målordsalternativen → isCorrect: false, isValidTranslation: true, score: 40-60
3. Om svaret är helt fel → isCorrect: false, isValidTranslation: false, score: 0-30

För scenario 2, ge pedagogisk feedback som förklarar att svaret är en bra översättning men inte det ord eleven ska lära sig från glosorna.",
            expected = req.expected_answer.trim(),
            w1 = pair.word1,
            w2 = pair.word2,
        ),
        None => "För icke-glosfrågor, acceptera korrekta svar och nära varianter.".to_string(),
    };
    format!(
        "Du är en pedagogisk AI-assistent som bedömer elevers muntliga svar.
Frågan är på {ql} och svaret förväntas vara på {al}.

{rubric}

Ge konstruktiv feedback på svenska och bedöm svaret på en skala 0-100.
Var uppmuntrande men ärlig i din bedömning.",
        ql = req.question_language,
        al = req.answer_language,
    )
}

/// Grading request. The student answer may be empty (silence); question and expected answer may not.
pub fn grading_request(variant: GradingPrompt, model: &str, req: &GradingRequest, sampling: Sampling) -> Result<ChatRequest, QuizError> {
    let question = require(&req.question, "Fråga krävs")?;
    let expected = require(&req.expected_answer, "Förväntat svar krävs")?;
    let answer = req.answer.trim();

    let messages = match variant {
        GradingPrompt::Detailed => vec![
            ChatMessage::system(detailed_grading_system(req)),
            ChatMessage::user(format!(
                "Fråga: {question}\n\nElevens svar: {answer}\n\nFörväntat svar: {expected}\n\n{GRADING_TEMPLATE}"
            )),
        ],
        GradingPrompt::Brief => vec![
            ChatMessage::system("Du bedömer elevers svar. Ge feedback på svenska och poäng 0-100."),
            ChatMessage::user(add_schema_guidance::<GradingResult>(format!(
                "Fråga: {question}\nElevens svar: {answer}\nRätt svar: {expected}\n\n\
                 Returnera JSON med isCorrect (boolean), feedback (text) och score (0-100)."
            ))),
        ],
    };
    Ok(request(model, messages, sampling))
}
