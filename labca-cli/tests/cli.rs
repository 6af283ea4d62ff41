use std::fs;

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn labca(home: &assert_fs::TempDir) -> Command {
	let mut cmd = Command::cargo_bin("labca").unwrap();
	cmd.env("LABCA_HOME", home.path()).env("RUST_LOG", "warn");
	cmd
}

fn hierarchy(home: &assert_fs::TempDir) {
	labca(home).arg("init").assert().success();
	for ca in ["trusted-identity", "root-ca", "intermediate-ca"] {
		labca(home)
			.arg(ca)
			.assert()
			.success()
			.stdout(predicate::str::contains("PASS"))
			.stdout(predicate::str::contains("FAIL").not());
	}
}

#[test]
fn localhost_server_end_to_end() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	hierarchy(&home);
	labca(&home)
		.args(["server", "--ip", ", IP:127.0.0.1", "localhost"])
		.assert()
		.success()
		.stdout(predicate::str::contains("PASS  localhost-haproxy.pem against intermediate-ca-chain.pem"));

	let output = labca(&home).args(["verify", "localhost"]).output()?;
	assert!(output.status.success());
	let stdout = String::from_utf8(output.stdout)?;
	assert_eq!(stdout.lines().filter(|line| line.starts_with("PASS")).count(), 11);
	assert!(!stdout.contains("FAIL"), "{stdout}");
	home.child("certs/certificates/localhost-chain.pem")
		.assert(predicate::path::is_file());
	Ok(())
}

#[test]
fn leaf_name_and_ip_are_prompted() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	hierarchy(&home);
	labca(&home)
		.arg("server")
		.write_stdin("nas.lan\n, IP:192.168.1.10\n")
		.assert()
		.success();
	home.child("extfiles/nas.lan.ext").assert(predicate::str::contains(
		"subjectAltName = DNS:nas.lan, DNS:*.nas.lan, IP:192.168.1.10",
	));
	Ok(())
}

#[test]
fn rsa_client_has_no_proxy_bundle() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	hierarchy(&home);
	labca(&home)
		.args(["client", "--rsa", "alice@example.com"])
		.assert()
		.success()
		.stdout(predicate::str::contains("haproxy").not());
	home.child("certs/certificates/alice@example.com-haproxy.pem")
		.assert(predicate::path::missing());
	home.child("private/certificates/alice@example.com.key")
		.assert(predicate::path::is_file());
	Ok(())
}

#[test]
fn trust_anchor_reissue_fails() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	hierarchy(&home);
	let anchor = home.child("certs/root/trusted-identity.pem");
	let before = fs::read(anchor.path())?;

	labca(&home)
		.args(["trusted-identity", "--yes"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("[ERROR]").and(predicate::str::contains("already exists")));
	assert_eq!(fs::read(anchor.path())?, before);
	Ok(())
}

#[test]
fn declined_overwrite_exits_one() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	hierarchy(&home);
	labca(&home).args(["policy", "no"]).assert().success();
	home.child("db/index.txt.attr").assert("unique_subject = no\n");
	let before = fs::read(home.child("certs/intermediate/intermediate-ca.pem").path())?;

	labca(&home)
		.arg("intermediate-ca")
		.write_stdin("Yes\n")
		.assert()
		.code(1)
		.stderr(predicate::str::contains("WARNING"))
		.stderr(predicate::str::contains("[ERROR] overwrite of `Home Lab Intermediate CA` not confirmed"));
	assert_eq!(
		fs::read(home.child("certs/intermediate/intermediate-ca.pem").path())?,
		before
	);

	labca(&home)
		.arg("intermediate-ca")
		.write_stdin("yes\n")
		.assert()
		.success();
	assert_ne!(
		fs::read(home.child("certs/intermediate/intermediate-ca.pem").path())?,
		before
	);
	Ok(())
}

#[test]
fn broken_signer_profile_aborts_intermediate() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	labca(&home).arg("init").assert().success();
	labca(&home).arg("trusted-identity").assert().success();
	labca(&home).arg("root-ca").assert().success();
	home.child("config/root-ca.toml").write_str("[signing]\npolicy = \"lax\"\n")?;

	labca(&home)
		.arg("intermediate-ca")
		.assert()
		.code(1)
		.stderr(predicate::str::contains(
			"[ERROR] signing intermediate-ca certificate with root-ca failed",
		));
	home.child("private/intermediate/intermediate-ca.key.pem")
		.assert(predicate::path::is_file());
	home.child("csr/intermediate-ca.csr.pem")
		.assert(predicate::path::is_file());
	home.child("certs/intermediate/intermediate-ca.pem")
		.assert(predicate::path::missing());
	home.child("certs/intermediate/intermediate-ca-chain.pem")
		.assert(predicate::path::missing());
	Ok(())
}

#[test]
fn verify_always_succeeds() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	labca(&home).arg("init").assert().success();
	labca(&home)
		.args(["verify", "--verbose", "root-ca"])
		.assert()
		.success()
		.stdout(predicate::str::contains("FAIL  root-ca.pem against root-ca-chain.pem (file not found"))
		.stdout(predicate::str::contains("trusted-identity.pem against trusted-identity.pem").not());
	Ok(())
}

#[test]
fn missing_ancestor_is_fatal() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	labca(&home).arg("init").assert().success();
	labca(&home)
		.args(["server", "localhost"])
		.assert()
		.code(1)
		.stderr(predicate::str::contains("[ERROR] signing CA certificate not found"));
	home.child("private/certificates/localhost.key.pem")
		.assert(predicate::path::missing());
	Ok(())
}

#[test]
fn init_is_idempotent() -> anyhow::Result<()> {
	let home = assert_fs::TempDir::new()?;
	let templates = home.child("templates");
	templates.create_dir_all()?;
	templates
		.child("server.toml")
		.write_str("[subject]\norganization = \"Home Lab\"\n")?;
	let ca = home.child("ca");

	for _ in 0..2 {
		Command::cargo_bin("labca")?
			.arg("--home")
			.arg(ca.path())
			.args(["init", "--templates"])
			.arg(templates.path())
			.assert()
			.success();
	}
	ca.child("config/server.toml")
		.assert("[subject]\norganization = \"Home Lab\"\n");
	ca.child("db/index.txt").assert("");
	Ok(())
}
