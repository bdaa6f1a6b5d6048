// Copyright (c) 2024-2026 Voxline Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Local dev harness: drives one `VoiceSession` against WAV or raw PCM16
/// audio on stdin (or a file), printing every control message it emits and
/// writing the synthesized response to a PCM file for playback. Mirrors the
/// shape of the teacher's single-binary CLI, minus everything that belongs
/// to the HTTP CRUD surface instead.
#[derive(Parser, Debug)]
#[command(name = "voxline", version, about = "Real-time voice-AI orchestration engine — dev harness")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Explicit config file layered on top of the usual search paths.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Input audio: a WAV file or raw PCM16LE@16kHz mono file. `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub input: PathBuf,

    /// Where to write the synthesized response audio (raw PCM16LE@16kHz).
    #[arg(long, default_value = "voxline-out.pcm")]
    pub output: PathBuf,

    /// System prompt for the one-off agent driving this session.
    #[arg(long, default_value = "You are a helpful voice assistant. Keep responses brief.")]
    pub system_prompt: String,

    /// LLM model id — selects the provider family (see `voxline_model::registry`).
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// TTS voice id passed through to the configured provider.
    #[arg(long, default_value = "default")]
    pub voice_id: String,

    /// Comma-separated built-in tool names to enable, e.g. "end_call,transfer_call".
    #[arg(long, value_delimiter = ',')]
    pub tools: Vec<String>,

    /// Emit tracing spans to stderr (defaults to warnings only).
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a shell completion script to stdout.
    Completions { shell: Shell },
}
