use pgqueue::clock::SystemClock;
use pgqueue::db;
use pgqueue::jobs::{JobsRepo, NewJob};
use std::env;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "pgqueuectl <command>\n\
             Commands:\n\
             - migrate\n\
             - enqueue <job_type> <payload_json> [max_attempts]\n\
             - list [status] [job_type]\n\
             - get <job_id>\n\
             \n\
             Uses DATABASE_URL or TEST_DATABASE_URL.\n"
        );
        std::process::exit(2);
    }

    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .expect("DATABASE_URL or TEST_DATABASE_URL must be set");

    let pool = db::make_pool(&url).await?;
    let repo = JobsRepo::new(pool.clone());
    let clock = SystemClock;

    match args[1].as_str() {
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        "enqueue" => {
            let job_type = args.get(2).expect("usage: pgqueuectl enqueue <job_type> <payload_json> [max_attempts]");
            let payload_json = args.get(3).map(String::as_str).unwrap_or("{}");
            let payload = serde_json::from_str(payload_json)?;
            let max_attempts = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(5);

            let job = repo
                .enqueue(
                    &clock,
                    NewJob {
                        job_type: job_type.clone(),
                        payload,
                        max_attempts,
                    },
                )
                .await?;
            println!("+ enqueued job id={}", job.id);
        }
        "list" => {
            let status = args.get(2).map(String::as_str);
            let job_type = args.get(3).map(String::as_str);
            let jobs = repo.list(50, status, job_type).await?;
            for job in jobs {
                println!(
                    "{} type={} status={} attempts={}/{} run_at={}",
                    job.id, job.job_type, job.status, job.attempts, job.max_attempts, job.run_at
                );
            }
        }
        "get" => {
            let id: Uuid = args
                .get(2)
                .expect("usage: pgqueuectl get <job_id>")
                .parse()?;
            match repo.get(id).await? {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => {
                    eprintln!("no such job: {id}");
                    std::process::exit(1);
                }
            }
        }
        other => {
            eprintln!("unknown command: {other}");
            std::process::exit(2);
        }
    }

    Ok(())
}
