//! Turns a profile into the program + arguments that start the server.

use regex::{NoExpand, RegexBuilder};
use std::path::PathBuf;
use tokio::fs;

use crate::models::{LaunchMode, ServerProfile};

#[cfg(windows)]
pub const LAUNCHER_SCRIPT: &str = ".craftkeeper_launcher.bat";
#[cfg(not(windows))]
pub const LAUNCHER_SCRIPT: &str = ".craftkeeper_launcher.sh";

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Splits a JVM argument line on whitespace, keeping double-quoted runs together.
pub fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

/// `<jvm args> -jar <jar> nogui`
pub fn java_args(profile: &ServerProfile) -> Vec<String> {
    let mut args = split_args(&profile.jvm_arguments);
    args.push("-jar".to_string());
    args.push(profile.jar_name.clone());
    args.push("nogui".to_string());
    args
}

/// Replaces every standalone `java` token with the quoted configured executable.
pub fn rewrite_script(content: &str, java: &str) -> String {
    let Ok(re) = RegexBuilder::new(r"\bjava\b").case_insensitive(true).build() else {
        return content.to_string();
    };
    let quoted = format!("\"{}\"", java);
    re.replace_all(content, NoExpand(&quoted)).into_owned()
}

fn shell_invocation(script: PathBuf) -> (String, Vec<String>) {
    let script = script.to_string_lossy().into_owned();
    if cfg!(windows) {
        ("cmd".to_string(), vec!["/c".to_string(), script])
    } else {
        ("sh".to_string(), vec![script])
    }
}

/// Builds the launch plan. Batch mode writes a rewritten copy of the script
/// next to the original and runs that copy through the platform shell.
pub async fn prepare(profile: &ServerProfile) -> std::io::Result<LaunchPlan> {
    let working_dir = profile.folder_path.clone();

    let (program, args) = match profile.launch_mode {
        LaunchMode::JavaJar => (profile.java_executable().to_string(), java_args(profile)),
        LaunchMode::BatchScript => {
            let original = profile.launch_artifact();
            let content = fs::read_to_string(&original).await?;
            let rewritten = rewrite_script(&content, profile.java_executable());
            let temp = working_dir.join(LAUNCHER_SCRIPT);
            fs::write(&temp, rewritten).await?;
            shell_invocation(temp)
        }
    };

    Ok(LaunchPlan {
        program,
        args,
        working_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_arguments_follow_jvm_args() {
        let mut p = ServerProfile::new("mc", "/srv/mc");
        p.jvm_arguments = "-Xmx4G -Xms4G".into();
        assert_eq!(
            java_args(&p),
            vec!["-Xmx4G", "-Xms4G", "-jar", "server.jar", "nogui"]
        );
    }

    #[test]
    fn empty_jvm_args_still_launch() {
        let p = ServerProfile::new("mc", "/srv/mc");
        assert_eq!(java_args(&p), vec!["-jar", "server.jar", "nogui"]);
    }

    #[test]
    fn quoted_arguments_stay_whole() {
        assert_eq!(
            split_args(r#"-Xmx2G "-Dlog4j.configurationFile=my conf.xml"  -XX:+UseG1GC"#),
            vec!["-Xmx2G", "-Dlog4j.configurationFile=my conf.xml", "-XX:+UseG1GC"]
        );
        assert_eq!(split_args("   "), Vec::<String>::new());
        assert_eq!(split_args(r#""""#), vec![""]);
    }

    #[test]
    fn script_java_token_is_replaced() {
        let script = "@echo off\nJava -Xmx4G -jar forge.jar nogui\nREM javascript stays\npause\n";
        let out = rewrite_script(script, r"C:\jdk\bin\java.exe");
        assert!(out.contains(r#""C:\jdk\bin\java.exe" -Xmx4G"#));
        assert!(out.contains("javascript stays"));
    }

    #[test]
    fn dollar_signs_in_java_path_are_literal() {
        let out = rewrite_script("java -jar a.jar", "/opt/$1/java");
        assert_eq!(out, r#""/opt/$1/java" -jar a.jar"#);
    }

    #[tokio::test]
    async fn batch_plan_runs_rewritten_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("start.sh"), "java -jar server.jar\n").unwrap();
        let mut p = ServerProfile::new("mc", dir.path());
        p.launch_mode = LaunchMode::BatchScript;
        p.batch_filename = "start.sh".into();
        p.java_path = "/opt/jdk/bin/java".into();

        let plan = prepare(&p).await.unwrap();
        let copy = dir.path().join(LAUNCHER_SCRIPT);
        assert_eq!(plan.args.last().unwrap(), &copy.to_string_lossy().into_owned());
        assert_eq!(
            std::fs::read_to_string(copy).unwrap(),
            "\"/opt/jdk/bin/java\" -jar server.jar\n"
        );
        assert_eq!(plan.working_dir, dir.path());
    }
}
