// src/console.rs

//! Interactive console quiz used by `quizly-cli`.

use std::io::{self, BufRead, Write};

use crate::services::QuizDraft;

const RULE: &str = "==================================================";

/// First `max_chars` characters of the transcript, with `...` when cut.
pub fn preview_transcript(transcript: &str, max_chars: usize) -> String {
    match transcript.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &transcript[..cut]),
        None => transcript.to_string(),
    }
}

/// Reads a 1-based option number until the input is valid. EOF is an error.
fn read_choice<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    option_count: usize,
) -> io::Result<usize> {
    loop {
        write!(out, "\nYour answer (1-{}): ", option_count)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before the quiz finished",
            ));
        }

        match line.trim().parse::<usize>() {
            Ok(n) if (1..=option_count).contains(&n) => return Ok(n - 1),
            _ => writeln!(out, "Please enter 1-{}!", option_count)?,
        }
    }
}

/// Asks every question in order and returns the number answered correctly.
pub fn run_quiz<R: BufRead, W: Write>(
    draft: &QuizDraft,
    mut input: R,
    mut out: W,
) -> io::Result<usize> {
    writeln!(out, "\n{}", RULE)?;
    writeln!(out, "{}", draft.title)?;
    writeln!(out, "{}", draft.description)?;
    writeln!(out, "{}\n", RULE)?;

    let mut score = 0;
    for (i, question) in draft.questions.iter().enumerate() {
        writeln!(out, "Question {}: {}\n", i + 1, question.question_title)?;
        for (j, option) in question.question_options.iter().enumerate() {
            writeln!(out, "  {}. {}", j + 1, option)?;
        }

        let choice = read_choice(&mut input, &mut out, question.question_options.len())?;
        if question.question_options[choice] == question.answer {
            writeln!(out, "Correct!\n")?;
            score += 1;
        } else {
            writeln!(out, "Wrong! Correct answer: {}\n", question.answer)?;
        }
    }

    writeln!(out, "{}", RULE)?;
    writeln!(out, "Result: {}/{} points", score, draft.questions.len())?;
    writeln!(out, "{}", RULE)?;

    Ok(score)
}
