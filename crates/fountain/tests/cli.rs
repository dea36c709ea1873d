//! Run the real `fountain` binary
#[cfg(test)]
mod cli {
    fn fountain(args: &[&str]) -> (String, String) {
        let output = std::process::Command::new(env!("CARGO_BIN_EXE_fountain"))
            .args(args)
            .env_remove("FOUNTAIN_LOG")
            .output()
            .unwrap();
        (
            String::from_utf8(output.stdout).unwrap(),
            String::from_utf8(output.stderr).unwrap(),
        )
    }

    #[test]
    fn runs_to_completion() {
        let (stdout, stderr) = fountain(&[
            "--particles",
            "20",
            "--policy",
            "burst",
            "--frame-rate",
            "1000",
            "--max-frames",
            "5",
            "--threads",
            "2",
            "--seed",
            "1",
        ]);
        assert!(stderr.is_empty(), "{stderr}");
        assert!(stdout.contains("Total animation time:"), "{stdout}");
        assert!(stdout.contains("5 frame(s), 20 particle(s) emitted"), "{stdout}");
    }

    #[test]
    fn bad_form_input() {
        let (stdout, stderr) = fountain(&["--width", "very wide", "--max-frames", "1"]);
        assert!(!stdout.contains("Total animation time"));
        assert!(
            stderr.contains("Invalid input, please enter valid numbers"),
            "{stderr}"
        );
    }

    #[test]
    fn shows_frames() {
        let (stdout, _) = fountain(&[
            "--particles",
            "50",
            "--frame-rate",
            "1000",
            "--max-frames",
            "2",
            "--threads",
            "1",
            "--show",
        ]);
        assert!(stdout.contains("\x1b[H"));
        assert!(stdout.contains('▀') || stdout.contains('▄'));
    }
}
