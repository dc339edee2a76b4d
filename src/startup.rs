use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthServices;
use crate::logger::LoggerMiddleware;
use crate::middleware::AccessGuardMiddleware;
use crate::routes::{get_current_user, health_check, login, logout, refresh, register};

pub fn run(listener: TcpListener, auth: AuthServices) -> Result<Server, std::io::Error> {
    let guard = auth.guard.clone();
    let auth = web::Data::new(auth);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(auth.clone())

            .route("/health_check", web::get().to(health_check))

            // Public routes (no authentication required)
            .service(
                web::scope("/auth")
                    .wrap(AccessGuardMiddleware::public(guard.clone()))
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh)),
            )

            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(AccessGuardMiddleware::protected(guard.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/logout", web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
