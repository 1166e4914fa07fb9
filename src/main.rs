use std::process;

use assessment_recommender::models::config::ServerConfig;
use assessment_recommender::processing::PipelineMessage;
use assessment_recommender::processing::embedding::FastEmbedder;
use assessment_recommender::processing::pipeline::{PipelineError, process_pipeline_message};
use assessment_recommender::processing::retrieval::{RecommenderContext, handle_recommend_request};
use assessment_recommender::repository::{FileRepository, IndexReader};

fn load_recommender<'a>(
    embedder: &'a FastEmbedder,
    repo: &FileRepository,
) -> Result<RecommenderContext<&'a FastEmbedder>, PipelineError> {
    let context = RecommenderContext::new(embedder, repo.load_index()?)?;
    log::info!("Serving recommendations over {} assessments", context.catalog().len());
    Ok(context)
}

fn bind_socket(context: &zmq::Context, kind: zmq::SocketType, address: &str) -> zmq::Socket {
    let socket = match context.socket(kind) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!("Cannot create zmq socket: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = socket.bind(address) {
        log::error!("Cannot bind zmq socket to {address}: {e}");
        process::exit(1);
    }
    log::info!("Listening on {address}");
    socket
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };
    let repo = FileRepository::new(config.storage.data_dir.clone());

    let embedder =
        match FastEmbedder::new(&config.embedding.model, config.embedding.cache_dir.clone()) {
            Ok(embedder) => embedder,
            Err(e) => {
                log::error!("Failed to load embedding model {}: {e}", config.embedding.model);
                process::exit(1);
            }
        };

    let context = zmq::Context::new();
    let jobs = bind_socket(&context, zmq::PULL, &config.zmq.jobs_address);
    let mut serving = config.zmq.recommend_address.as_deref().map(|address| {
        let recommender = match load_recommender(&embedder, &repo) {
            Ok(recommender) => recommender,
            Err(e) => {
                log::error!("Failed to load recommendation index: {e}");
                process::exit(1);
            }
        };
        (bind_socket(&context, zmq::REP, address), recommender)
    });

    loop {
        let (job_ready, request_ready) = {
            let mut items = vec![jobs.as_poll_item(zmq::POLLIN)];
            if let Some((socket, _)) = &serving {
                items.push(socket.as_poll_item(zmq::POLLIN));
            }
            if let Err(e) = zmq::poll(&mut items, -1) {
                log::error!("Failed to poll sockets: {e}");
                continue;
            }
            (
                items[0].is_readable(),
                items.get(1).is_some_and(|item| item.is_readable()),
            )
        };

        if job_ready {
            match jobs.recv_bytes(0) {
                Ok(msg) => match serde_json::from_slice::<PipelineMessage>(&msg) {
                    Ok(parsed) => match process_pipeline_message(&parsed, &config, &embedder, &repo) {
                        Ok(()) if parsed.rebuilds_index() => {
                            if let Some((_, recommender)) = serving.as_mut() {
                                match load_recommender(&embedder, &repo) {
                                    Ok(reloaded) => *recommender = reloaded,
                                    Err(e) => log::error!("Keeping previous index: {e}"),
                                }
                            }
                        }
                        Ok(()) => {}
                        Err(e) => log::error!("Pipeline job {parsed:?} failed: {e}"),
                    },
                    Err(e) => log::error!("Failed to parse JSON: {e}"),
                },
                Err(e) => log::error!("Failed to receive job: {e}"),
            }
        }

        if let (true, Some((socket, recommender))) = (request_ready, &serving) {
            match socket.recv_bytes(0) {
                Ok(request) => {
                    let reply = handle_recommend_request(recommender, &request);
                    if let Err(e) = socket.send(reply, 0) {
                        log::error!("Failed to send reply: {e}");
                    }
                }
                Err(e) => log::error!("Failed to receive request: {e}"),
            }
        }
    }
}
