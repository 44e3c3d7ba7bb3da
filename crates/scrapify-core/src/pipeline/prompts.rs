//! Prompts sent to the generative service.
//!
//! Each prompt names the exact JSON shape the matching domain type parses.

pub const TRANSCRIPTION: &str = "Transcribe this audio file into a JSON array of objects \
with 'timestamp' (MM:SS) and 'event' (the transcribed text) fields. \
Return ONLY the JSON array.";

/// Prompt for the study guide; the grid images are attached separately.
pub fn study_guide(transcript_json: &str, grid_count: usize) -> String {
    format!(
        "Based on the following transcription and the {grid_count} attached image grid(s) \
(each grid holds up to 20 video snapshots in 5 columns by 4 rows, read left to right, \
top to bottom, one snapshot every few seconds), generate a comprehensive study guide \
in JSON format. Return ONLY the JSON object, with these fields:\n\
- 'title': string\n\
- 'summary': string\n\
- 'key_points': array of strings\n\
- 'glossary': array of {{term: definition}} objects\n\
- 'timeline': array of {{'timestamp': 'MM:SS', 'event': string}}\n\
- 'visual_analysis': array of {{'grid_index': number starting at 1, 'item_index': number \
starting at 1, 'timestamp': 'MM:SS', 'explanation': string}} for snapshots worth a closer look\n\
- 'external_resources': array of {{'type': 'video' | 'article' | 'documentation', \
'title': string, 'url': string}}\n\
- 'quiz': array of {{'question': string, 'options': array of strings, 'answer': string}}\n\
Transcription: {transcript_json}"
    )
}
